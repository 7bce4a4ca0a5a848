//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use codedock_core::{Config, FontSize};

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str = "data_dir, surface_url, surface_origin, language, theme, font_size, \
                    ready_timeout_secs, formatter, download_dir, log_file";

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            output.print_json(&serde_json::json!({
                "data_dir": config.data_dir,
                "surface_url": config.surface_url,
                "surface_origin": config.surface_origin,
                "language": config.language,
                "theme": config.theme,
                "font_size": config.font_size,
                "ready_timeout_secs": config.ready_timeout_secs,
                "formatter": config.formatter,
                "download_dir": config.download_dir,
                "log_file": config.log_file,
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            let origin = config
                .resolved_surface_origin()
                .unwrap_or_else(|e| format!("(invalid: {})", e));
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!("  surface_url:        {}", config.surface_url);
            println!(
                "  surface_origin:     {}",
                match config.surface_origin {
                    Some(ref o) => o.clone(),
                    None => format!("{} (default)", origin),
                }
            );
            println!("  language:           {}", config.language);
            println!("  theme:              {}", config.theme);
            println!("  font_size:          {}", config.font_size.get());
            println!("  ready_timeout_secs: {}", config.ready_timeout_secs);
            println!("  formatter:          {}", config.formatter);
            println!("  download_dir:       {}", display_opt(&config.download_dir));
            println!("  log_file:           {}", display_opt(&config.log_file));
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Apply one `key = value` assignment to a config
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "data_dir" => config.data_dir = value.into(),
        "surface_url" => config.surface_url = value.to_string(),
        "surface_origin" => {
            config.surface_origin = if unset { None } else { Some(value.to_string()) };
        }
        "language" => config.language = value.parse()?,
        "theme" => config.theme = value.parse()?,
        "font_size" => {
            let px: u32 = value
                .parse()
                .context("Invalid value for font_size. Use a number of pixels.")?;
            config.font_size = FontSize::new(px);
        }
        "ready_timeout_secs" => {
            config.ready_timeout_secs = value
                .parse()
                .context("Invalid value for ready_timeout_secs. Use a number of seconds.")?;
        }
        "formatter" => config.formatter = value.to_string(),
        "download_dir" => {
            config.download_dir = if unset { None } else { Some(value.into()) };
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Round-trip through the loader's checks before writing
    let serialized = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    Config::load_from_str(&serialized).context("Refusing to save an invalid configuration")?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedock_core::{Language, Theme};

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "language", "python").unwrap();
        apply(&mut config, "theme", "light").unwrap();
        apply(&mut config, "font_size", "99").unwrap();
        apply(&mut config, "surface_origin", "https://onecompiler.com").unwrap();
        apply(&mut config, "download_dir", "/tmp/out").unwrap();

        assert_eq!(config.language, Language::Python);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.font_size.get(), 32);
        assert_eq!(
            config.surface_origin.as_deref(),
            Some("https://onecompiler.com")
        );
        assert_eq!(config.download_dir, Some(PathBuf::from("/tmp/out")));

        apply(&mut config, "surface_origin", "none").unwrap();
        assert_eq!(config.surface_origin, None);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "language", "cobol").is_err());
        assert!(apply(&mut config, "font_size", "big").is_err());
        let err = apply(&mut config, "sync_url", "x").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let data_dir = temp.path().join("data");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", data_dir.display().to_string()),
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        set("theme".into(), "light".into(), Some(&path), &output).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("theme = \"light\""));
    }
}
