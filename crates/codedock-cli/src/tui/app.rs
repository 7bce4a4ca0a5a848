//! Application state and logic

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyModifiers};

use codedock_core::{
    Action, Config, ControllerEvent, Notice, NoticeLevel, SurfaceConfig, SyncPhase,
};

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// How long the run banner stays visible
const CELEBRATION_TIME: Duration = Duration::from_millis(1500);

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Send an action to the session
    Dispatch(Action),
    /// Scroll the code pane by a number of lines
    Scroll(i32),
    ToggleHelp,
    Quit,
    Ignored,
}

/// Map a key press in normal mode
pub fn key_outcome(code: KeyCode, modifiers: KeyModifiers) -> KeyOutcome {
    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => KeyOutcome::Quit,
            KeyCode::Char('d') => KeyOutcome::Scroll(10),
            KeyCode::Char('u') => KeyOutcome::Scroll(-10),
            _ => KeyOutcome::Ignored,
        };
    }

    match code {
        KeyCode::Char('q') => KeyOutcome::Quit,
        KeyCode::Char('?') => KeyOutcome::ToggleHelp,
        KeyCode::Char('s') => KeyOutcome::Dispatch(Action::Save),
        KeyCode::Char('r') => KeyOutcome::Dispatch(Action::Run),
        KeyCode::Char('x') => KeyOutcome::Dispatch(Action::Reset),
        KeyCode::Char('f') => KeyOutcome::Dispatch(Action::Format),
        KeyCode::Char('+') | KeyCode::Char('=') => KeyOutcome::Dispatch(Action::ZoomIn),
        KeyCode::Char('-') => KeyOutcome::Dispatch(Action::ZoomOut),
        KeyCode::Char('t') => KeyOutcome::Dispatch(Action::ToggleTheme),
        KeyCode::Char('l') => KeyOutcome::Dispatch(Action::NextLanguage),
        KeyCode::Char('L') => KeyOutcome::Dispatch(Action::PrevLanguage),
        KeyCode::Char('d') => KeyOutcome::Dispatch(Action::DownloadFile),
        KeyCode::Char('i') => KeyOutcome::Dispatch(Action::DownloadImage),
        KeyCode::Char('R') => KeyOutcome::Dispatch(Action::Reload),
        KeyCode::Char('j') | KeyCode::Down => KeyOutcome::Scroll(1),
        KeyCode::Char('k') | KeyCode::Up => KeyOutcome::Scroll(-1),
        KeyCode::PageDown => KeyOutcome::Scroll(20),
        KeyCode::PageUp => KeyOutcome::Scroll(-20),
        _ => KeyOutcome::Ignored,
    }
}

/// Application state
///
/// Mirrors what the session reports; the session owns the real state.
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Last code reported by the controller
    pub code: String,
    pub document_name: String,
    pub surface: SurfaceConfig,
    pub phase: SyncPhase,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    pub status_level: NoticeLevel,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
    /// Whether help overlay is visible
    pub show_help: bool,
    /// First visible line of the code pane
    pub code_scroll: u16,
    /// When the last run was triggered
    pub celebration: Option<Instant>,
    /// Most recent exported artifact
    pub last_export: Option<PathBuf>,
    /// Surface bridge endpoint, for the header
    pub surface_url: String,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let surface = config.surface_config();
        Self {
            should_quit: false,
            code: String::new(),
            document_name: surface.language.default_document_name(),
            surface,
            phase: SyncPhase::Uninitialized,
            status_message: None,
            status_level: NoticeLevel::Info,
            status_message_time: None,
            show_help: false,
            code_scroll: 0,
            celebration: None,
            last_export: None,
            surface_url: config.surface_url.clone(),
        }
    }

    /// Fold one controller event into the view state
    pub fn apply_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::PhaseChanged(phase) => self.phase = phase,
            ControllerEvent::ConfigChanged(surface) => self.surface = surface,
            ControllerEvent::CodeChanged {
                code,
                document_name,
            } => {
                self.code = code;
                self.document_name = document_name;
                self.clamp_scroll();
            }
            ControllerEvent::Notice(notice) => self.set_notice(notice),
            ControllerEvent::RunTriggered => self.celebration = Some(Instant::now()),
            ControllerEvent::Exported { path } => self.last_export = Some(path),
        }
    }

    /// Set a status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.set_notice(Notice::info(message));
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.status_level = notice.level;
        self.status_message = Some(notice.message);
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
        if self
            .celebration
            .is_some_and(|at| at.elapsed() > CELEBRATION_TIME)
        {
            self.celebration = None;
        }
    }

    /// Whether the run banner should be shown
    pub fn is_celebrating(&self) -> bool {
        self.celebration.is_some()
    }

    /// Toggle help overlay
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }

    /// Scroll the code pane, staying within the document
    pub fn scroll(&mut self, delta: i32) {
        let next = (i64::from(self.code_scroll) + i64::from(delta)).max(0);
        self.code_scroll = next.min(i64::from(u16::MAX)) as u16;
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let max = self.line_count().saturating_sub(1).min(u16::MAX as usize) as u16;
        self.code_scroll = self.code_scroll.min(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedock_core::{Language, Theme};

    fn app() -> App {
        App::new(&Config::default())
    }

    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            key_outcome(KeyCode::Char('r'), none),
            KeyOutcome::Dispatch(Action::Run)
        );
        assert_eq!(
            key_outcome(KeyCode::Char('L'), KeyModifiers::SHIFT),
            KeyOutcome::Dispatch(Action::PrevLanguage)
        );
        assert_eq!(
            key_outcome(KeyCode::Char('R'), KeyModifiers::SHIFT),
            KeyOutcome::Dispatch(Action::Reload)
        );
        assert_eq!(
            key_outcome(KeyCode::Char('c'), KeyModifiers::CONTROL),
            KeyOutcome::Quit
        );
        assert_eq!(key_outcome(KeyCode::Char('z'), none), KeyOutcome::Ignored);
    }

    #[test]
    fn test_apply_events() {
        let mut app = app();
        assert_eq!(app.document_name, "main.java");

        app.apply_event(ControllerEvent::PhaseChanged(SyncPhase::Synced));
        app.apply_event(ControllerEvent::ConfigChanged(SurfaceConfig {
            language: Language::C,
            theme: Theme::Light,
            ..SurfaceConfig::default()
        }));
        app.apply_event(ControllerEvent::CodeChanged {
            code: "int x;\n".to_string(),
            document_name: "main.c".to_string(),
        });

        assert_eq!(app.phase, SyncPhase::Synced);
        assert_eq!(app.surface.theme, Theme::Light);
        assert_eq!(app.code, "int x;\n");
        assert_eq!(app.document_name, "main.c");

        app.apply_event(ControllerEvent::RunTriggered);
        assert!(app.is_celebrating());
    }

    #[test]
    fn test_notice_sets_status() {
        let mut app = app();
        app.apply_event(ControllerEvent::Notice(Notice::error("Formatting failed.")));
        assert_eq!(app.status_message.as_deref(), Some("Formatting failed."));
        assert_eq!(app.status_level, NoticeLevel::Error);

        app.check_status_timeout();
        assert!(app.status_message.is_some());

        app.status_message_time = Some(Instant::now() - Duration::from_secs(10));
        app.check_status_timeout();
        assert!(app.status_message.is_none());
    }

    #[test]
    fn test_scroll_stays_in_document() {
        let mut app = app();
        app.apply_event(ControllerEvent::CodeChanged {
            code: "a\nb\nc\n".to_string(),
            document_name: "main.java".to_string(),
        });

        app.scroll(-5);
        assert_eq!(app.code_scroll, 0);
        app.scroll(10);
        assert_eq!(app.code_scroll, 2);

        app.apply_event(ControllerEvent::CodeChanged {
            code: String::new(),
            document_name: "main.java".to_string(),
        });
        assert_eq!(app.code_scroll, 0);
    }
}
