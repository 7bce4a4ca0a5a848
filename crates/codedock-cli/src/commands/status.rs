//! Status command handler

use anyhow::Result;

use codedock_core::{Config, FileCodeStore};

use crate::output::{human_size, Output, OutputFormat};

/// Show status information
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let store = FileCodeStore::from_config(config);
    let info = store.info();
    let origin = config.resolved_surface_origin()?;

    match output.format {
        OutputFormat::Json => {
            output.print_json(&serde_json::json!({
                "surface": {
                    "url": config.surface_url,
                    "origin": origin,
                    "ready_timeout_secs": config.ready_timeout_secs,
                },
                "editor": {
                    "language": config.language,
                    "theme": config.theme,
                    "font_size": config.font_size,
                    "document_name": config.language.default_document_name(),
                },
                "storage": {
                    "path": store.path(),
                    "exists": info.exists,
                    "size": info.size,
                    "modified": info.modified.map(|m| m.to_rfc3339()),
                },
                "export_dir": config.export_dir(),
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", store.path().display());
        }
        OutputFormat::Human => {
            println!("codedock Status");
            println!("===============");
            println!();
            println!("Surface:");
            println!("  Bridge:  {}", config.surface_url);
            println!("  Origin:  {}", origin);
            match config.ready_timeout() {
                Some(timeout) => println!("  Timeout: {}s", timeout.as_secs()),
                None => println!("  Timeout: disabled"),
            }
            println!();
            println!("Editor:");
            println!("  Language:  {}", config.language.display_name());
            println!("  Theme:     {}", config.theme);
            println!("  Font size: {}", config.font_size);
            println!();
            println!("Saved code:");
            println!("  Location: {}", store.path().display());
            if info.exists {
                println!("  Size:     {}", human_size(info.size));
                if let Some(modified) = info.modified {
                    println!("  Modified: {}", modified.format("%Y-%m-%d %H:%M"));
                }
            } else {
                println!("  (nothing saved yet)");
            }
            println!();
            println!("Exports: {}", config.export_dir().display());
        }
    }

    Ok(())
}
