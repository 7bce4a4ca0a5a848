//! codedock TUI
//!
//! Terminal host for the embedded editing surface.
//!
//! ## Layout
//!
//! - Header: language, theme, font size and surface phase
//! - Code pane: the authoritative code, as last reported by the session
//! - Status bar: notices (auto-dismiss) or key hints
//!
//! ## Commands
//!
//! - s: Save          - r: Run           - f: Format
//! - x: Reset         - +/-: Zoom        - t: Toggle theme
//! - l/L: Language    - d: Download file - i: Download image
//! - R: Reload        - ?: Help          - q: Quit

mod app;
mod ui;

use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::info;

use codedock_core::{spawn_session, Config, SessionHandle};

use app::{key_outcome, App, KeyOutcome};

use crate::logging;

/// Run the TUI application
pub async fn run(config_path: Option<&PathBuf>) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    // File-based, only if CODEDOCK_LOG is set
    logging::init_file_logging(&config);

    let session = spawn_session(&config).context("Failed to start editor session")?;
    let mut app = App::new(&config);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_app(&mut terminal, &mut app, session).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut session: SessionHandle,
) -> Result<()> {
    loop {
        // Check for status message timeout
        app.check_status_timeout();

        terminal.draw(|frame| ui::draw(frame, app))?;

        if app.should_quit {
            break;
        }

        tokio::select! {
            biased;

            controller_event = session.event_rx.recv() => {
                match controller_event {
                    Some(event) => app.apply_event(event),
                    None => {
                        app.set_status("Editor session stopped");
                        app.should_quit = true;
                    }
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if !event::poll(Duration::from_millis(0))? {
                    continue;
                }
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                // Only handle key press events (not release)
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // If help is showing, any key dismisses it
                if app.show_help {
                    app.show_help = false;
                    continue;
                }

                match key_outcome(key.code, key.modifiers) {
                    KeyOutcome::Dispatch(action) => {
                        if let Err(e) = session.dispatch(action).await {
                            app.set_status(format!("{:#}", e));
                        }
                    }
                    KeyOutcome::Scroll(delta) => app.scroll(delta),
                    KeyOutcome::ToggleHelp => app.toggle_help(),
                    KeyOutcome::Quit => app.should_quit = true,
                    KeyOutcome::Ignored => {}
                }
            }
        }
    }

    info!("Quitting TUI");
    session.shutdown().await
}
