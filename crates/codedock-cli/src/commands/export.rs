//! Export command handlers
//!
//! Exports the persisted code without starting a surface, using the
//! configured language, theme and font size.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use codedock_core::export::{self, Artifact};
use codedock_core::{CodeStore, Config, ExportError, ExportSnapshot, FileCodeStore, Language};

use crate::output::Output;

/// Kind of artifact to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    File,
    Image,
}

impl ExportKind {
    fn label(self) -> &'static str {
        match self {
            ExportKind::File => "a file",
            ExportKind::Image => "an image",
        }
    }
}

/// Options shared by both export kinds
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub out: Option<PathBuf>,
    pub language: Option<Language>,
    pub open: bool,
    pub data_url: bool,
}

/// Build a snapshot of the persisted code
fn snapshot(config: &Config, language: Option<Language>) -> Result<ExportSnapshot> {
    let store = FileCodeStore::from_config(config);
    let code = store
        .load()
        .with_context(|| format!("Failed to read saved code from {:?}", store.path()))?
        .unwrap_or_default();
    let language = language.unwrap_or(config.language);

    Ok(ExportSnapshot {
        code,
        document_name: language.default_document_name(),
        language,
        theme: config.theme,
        font_size: config.font_size,
    })
}

fn render(kind: ExportKind, snapshot: &ExportSnapshot) -> Result<Artifact> {
    match kind {
        ExportKind::File => Ok(export::export_file(snapshot)),
        ExportKind::Image => match export::export_image(snapshot) {
            Ok(artifact) => Ok(artifact),
            Err(ExportError::EmptyCode) => bail!("No code to download as an image!"),
            Err(e) => Err(e).context("Failed to download code as an image."),
        },
    }
}

/// Export the persisted code into `dir`
pub fn write(
    kind: ExportKind,
    config: &Config,
    language: Option<Language>,
    dir: &Path,
) -> Result<(PathBuf, Artifact)> {
    let snapshot = snapshot(config, language)?;
    let artifact = render(kind, &snapshot)?;
    let path = export::save_artifact(dir, &artifact)
        .with_context(|| format!("Failed to write export into {:?}", dir))?;
    Ok((path, artifact))
}

/// Run an export command
pub fn run(kind: ExportKind, config: &Config, options: ExportOptions, output: &Output) -> Result<()> {
    let dir = options.out.unwrap_or_else(|| config.export_dir());
    let (path, artifact) = write(kind, config, options.language, &dir)?;

    let data_url = options.data_url.then(|| artifact.data_url());
    output.print_artifact(kind.label(), &path, data_url.as_deref());

    if options.open {
        open::that(&path).with_context(|| format!("Failed to open {:?}", path))?;
    }

    Ok(())
}
