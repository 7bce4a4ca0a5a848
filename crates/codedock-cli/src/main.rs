//! codedock CLI
//!
//! Terminal host for an embedded code-editing surface, plus offline
//! commands for the persisted code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codedock_core::{Config, Language};

mod commands;
mod logging;
mod output;
mod prompt;
mod tui;

use commands::export::{ExportKind, ExportOptions};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "codedock")]
#[command(about = "codedock - host for an embedded code editor")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI interface
    Tui,
    /// Show status (surface, editor defaults, saved code)
    Status,
    /// Export the saved code
    Export {
        #[command(subcommand)]
        kind: ExportCommands,
    },
    /// Clear the saved code
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(clap::Args, Clone)]
struct ExportArgs {
    /// Directory to write into (defaults to the configured download dir)
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Language to export as (defaults to the configured language)
    #[arg(short, long)]
    language: Option<Language>,

    /// Open the exported file with the system opener
    #[arg(long)]
    open: bool,

    /// Also print the artifact as a data: URL
    #[arg(long)]
    data_url: bool,
}

impl From<ExportArgs> for ExportOptions {
    fn from(args: ExportArgs) -> Self {
        ExportOptions {
            out: args.out,
            language: args.language,
            open: args.open,
            data_url: args.data_url,
        }
    }
}

#[derive(Subcommand, Clone)]
enum ExportCommands {
    /// Download the code as a file
    File(ExportArgs),
    /// Download the code as a PNG image
    Image(ExportArgs),
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (language, theme, font_size, surface_url, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the current config does not load
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    // Handle TUI (default when no command given)
    let Some(command) = cli.command else {
        return tui::run(config_path).await;
    };
    if matches!(command, Commands::Tui) {
        return tui::run(config_path).await;
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    logging::init_file_logging(&config);

    match command {
        Commands::Tui | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&config, &output),
        Commands::Export { kind } => match kind {
            ExportCommands::File(args) => {
                commands::export::run(ExportKind::File, &config, args.into(), &output)
            }
            ExportCommands::Image(args) => {
                commands::export::run(ExportKind::Image, &config, args.into(), &output)
            }
        },
        Commands::Reset { yes } => commands::reset::reset(&config, yes, &output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
