//! Logging setup
//!
//! The TUI owns the terminal, so logs only ever go to a file, and only when
//! `CODEDOCK_LOG` is set (e.g. `CODEDOCK_LOG=debug`).

use std::fs::File;

use tracing::info;
use tracing_subscriber::EnvFilter;

use codedock_core::Config;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "CODEDOCK_LOG";

fn filter_directives(level: &str) -> String {
    format!("codedock_core={},codedock_cli={}", level, level)
}

/// Initialize file-based logging if `CODEDOCK_LOG` is set
pub fn init_file_logging(config: &Config) {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return;
    };

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(filter_directives(&log_level));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
