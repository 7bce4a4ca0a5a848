//! User-visible commands
//!
//! `Action` is the vocabulary shared by every front end; the `Dispatcher`
//! turns actions into controller operations and runs exports.

use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::controller::{ControllerEvent, Notice, SyncController};
use crate::export::{self, ExportError};
use crate::format::Formatter;
use crate::models::{Language, Theme};
use crate::storage::CodeStore;
use crate::surface::SurfaceConnector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Run,
    Reset,
    Format,
    ZoomIn,
    ZoomOut,
    ToggleTheme,
    SetTheme(Theme),
    SetLanguage(Language),
    NextLanguage,
    PrevLanguage,
    Reload,
    DownloadFile,
    DownloadImage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Save => f.write_str("save"),
            Action::Run => f.write_str("run"),
            Action::Reset => f.write_str("reset"),
            Action::Format => f.write_str("format"),
            Action::ZoomIn => f.write_str("zoom in"),
            Action::ZoomOut => f.write_str("zoom out"),
            Action::ToggleTheme => f.write_str("toggle theme"),
            Action::SetTheme(theme) => write!(f, "theme {}", theme),
            Action::SetLanguage(language) => write!(f, "language {}", language),
            Action::NextLanguage => f.write_str("next language"),
            Action::PrevLanguage => f.write_str("previous language"),
            Action::Reload => f.write_str("reload"),
            Action::DownloadFile => f.write_str("download file"),
            Action::DownloadImage => f.write_str("download image"),
        }
    }
}

/// Routes actions to a controller
pub struct Dispatcher<F> {
    formatter: F,
    export_dir: PathBuf,
}

impl<F: Formatter> Dispatcher<F> {
    pub fn new(formatter: F, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            formatter,
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &PathBuf {
        &self.export_dir
    }

    pub async fn dispatch<C, S>(&self, controller: &mut SyncController<C, S>, action: Action)
    where
        C: SurfaceConnector,
        S: CodeStore,
    {
        match action {
            Action::Save => controller.save(),
            Action::Run => controller.run(),
            Action::Reset => controller.reset(),
            Action::Format => controller.format(&self.formatter).await,
            Action::ZoomIn => {
                controller.increase_font_size();
            }
            Action::ZoomOut => {
                controller.decrease_font_size();
            }
            Action::ToggleTheme => {
                controller.toggle_theme();
            }
            Action::SetTheme(theme) => {
                controller.set_theme(theme);
            }
            Action::SetLanguage(language) => {
                controller.set_language(language);
            }
            Action::NextLanguage => {
                let next = controller.state().language.next();
                controller.set_language(next);
            }
            Action::PrevLanguage => {
                let prev = controller.state().language.prev();
                controller.set_language(prev);
            }
            Action::Reload => controller.reload(),
            Action::DownloadFile => self.download_file(controller),
            Action::DownloadImage => self.download_image(controller),
        }
    }

    fn download_file<C: SurfaceConnector, S: CodeStore>(&self, controller: &SyncController<C, S>) {
        let artifact = export::export_file(&controller.snapshot());
        match export::save_artifact(&self.export_dir, &artifact) {
            Ok(path) => {
                controller.emit(ControllerEvent::Exported { path });
                controller.report(Notice::success("Code downloaded as a file!"));
            }
            Err(e) => {
                warn!("File export failed: {}", e);
                controller.report(Notice::error("Failed to download code as a file."));
            }
        }
    }

    fn download_image<C: SurfaceConnector, S: CodeStore>(
        &self,
        controller: &SyncController<C, S>,
    ) {
        let result = export::export_image(&controller.snapshot())
            .and_then(|artifact| export::save_artifact(&self.export_dir, &artifact));
        match result {
            Ok(path) => {
                controller.emit(ControllerEvent::Exported { path });
                controller.report(Notice::success("Code downloaded as an image!"));
            }
            Err(ExportError::EmptyCode) => {
                controller.report(Notice::warning("No code to download as an image!"));
            }
            Err(e) => {
                warn!("Image export failed: {}", e);
                controller.report(Notice::error("Failed to download code as an image."));
            }
        }
    }
}
