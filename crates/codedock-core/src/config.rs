//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/codedock/config.toml)
//! 3. Environment variables (CODEDOCK_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::models::{FontSize, Language, SurfaceConfig, Theme};

/// Environment variable prefix
const ENV_PREFIX: &str = "CODEDOCK";

/// Default surface bridge endpoint
pub const DEFAULT_SURFACE_URL: &str = "ws://127.0.0.1:8791/embed";

/// Default ready timeout before a load failure is reported
const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (persisted code, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the surface bridge; the language is appended as a path segment
    #[serde(default = "default_surface_url")]
    pub surface_url: String,

    /// Origin that inbound surface messages must carry
    ///
    /// Defaults to the embedded editor's origin, `DEFAULT_SURFACE_ORIGIN`.
    #[serde(default)]
    pub surface_origin: Option<String>,

    /// Language the editor starts with
    #[serde(default)]
    pub language: Language,

    /// Theme the editor starts with
    #[serde(default)]
    pub theme: Theme,

    /// Font size the editor starts with
    #[serde(default)]
    pub font_size: FontSize,

    /// Seconds to wait for a surface to report ready (0 disables)
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Pretty-printer executable
    #[serde(default = "default_formatter")]
    pub formatter: String,

    /// Directory exported files are written to
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Log file path (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            surface_url: default_surface_url(),
            surface_origin: None,
            language: Language::default(),
            theme: Theme::default(),
            font_size: FontSize::default(),
            ready_timeout_secs: default_ready_timeout_secs(),
            formatter: default_formatter(),
            download_dir: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (CODEDOCK_DATA_DIR, CODEDOCK_SURFACE_URL, ...)
    /// 2. Config file (~/.config/codedock/config.toml or CODEDOCK_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored with a warning.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SURFACE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.surface_url = val;
            }
        }

        // Empty string clears the override
        if let Ok(val) = std::env::var(format!("{}_SURFACE_ORIGIN", ENV_PREFIX)) {
            self.surface_origin = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_LANGUAGE", ENV_PREFIX)) {
            match val.parse() {
                Ok(language) => self.language = language,
                Err(e) => warn!("Ignoring {}_LANGUAGE: {}", ENV_PREFIX, e),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_THEME", ENV_PREFIX)) {
            match val.parse() {
                Ok(theme) => self.theme = theme,
                Err(e) => warn!("Ignoring {}_THEME: {}", ENV_PREFIX, e),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_FONT_SIZE", ENV_PREFIX)) {
            match val.trim().parse::<u32>() {
                Ok(px) => self.font_size = FontSize::new(px),
                Err(e) => warn!("Ignoring {}_FONT_SIZE={:?}: {}", ENV_PREFIX, val, e),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_FORMATTER", ENV_PREFIX)) {
            if !val.is_empty() {
                self.formatter = val;
            }
        }
    }

    /// Check values that cannot be repaired by clamping
    fn validate(&self) -> Result<()> {
        self.surface_base_url()?;
        if let Some(ref origin) = self.surface_origin {
            Url::parse(origin)
                .with_context(|| format!("Invalid surface_origin: {:?}", origin))?;
        }
        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with CODEDOCK_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codedock")
            .join("config.toml")
    }

    /// Get the path to the persisted code slot
    pub fn code_path(&self) -> PathBuf {
        self.data_dir.join("editorCode")
    }

    /// Get the log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    /// Directory exported artifacts are written to
    pub fn export_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.data_dir.join("exports"))
    }

    /// Parsed surface bridge base URL
    pub fn surface_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.surface_url)
            .with_context(|| format!("Invalid surface_url: {:?}", self.surface_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("surface_url must be a hierarchical URL: {:?}", self.surface_url);
        }
        Ok(url)
    }

    /// Origin inbound messages must come from
    pub fn resolved_surface_origin(&self) -> Result<String> {
        let url = match self.surface_origin {
            Some(ref origin) => Url::parse(origin)
                .with_context(|| format!("Invalid surface_origin: {:?}", origin))?,
            None => Url::parse(DEFAULT_SURFACE_ORIGIN)?,
        };
        Ok(url.origin().ascii_serialization())
    }

    /// Initial surface configuration
    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            language: self.language,
            theme: self.theme,
            font_size: self.font_size,
        }
    }

    /// Ready timeout, `None` when disabled
    pub fn ready_timeout(&self) -> Option<Duration> {
        (self.ready_timeout_secs > 0).then(|| Duration::from_secs(self.ready_timeout_secs))
    }
}

/// Origin of the embedded editor frame relayed by the bridge
pub const DEFAULT_SURFACE_ORIGIN: &str = "https://onecompiler.com";

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codedock")
}

fn default_surface_url() -> String {
    DEFAULT_SURFACE_URL.to_string()
}

fn default_ready_timeout_secs() -> u64 {
    DEFAULT_READY_TIMEOUT_SECS
}

fn default_formatter() -> String {
    "prettier".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "CODEDOCK_DATA_DIR",
        "CODEDOCK_SURFACE_URL",
        "CODEDOCK_SURFACE_ORIGIN",
        "CODEDOCK_LANGUAGE",
        "CODEDOCK_THEME",
        "CODEDOCK_FONT_SIZE",
        "CODEDOCK_FORMATTER",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.language, Language::Java);
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.font_size.get(), 22);
        assert_eq!(config.surface_url, DEFAULT_SURFACE_URL);
        assert!(config.data_dir.ends_with("codedock"));
        assert_eq!(config.ready_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.code_path().ends_with("editorCode"));
        assert!(config.log_path().ends_with("debug.log"));
    }

    #[test]
    fn test_default_surface_origin_is_editor_origin() {
        let config = Config::default();
        assert_eq!(
            config.resolved_surface_origin().unwrap(),
            "https://onecompiler.com"
        );

        // Independent of where the bridge lives
        let config = Config {
            surface_url: "wss://bridge.example.com:9000/embed".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.resolved_surface_origin().unwrap(),
            DEFAULT_SURFACE_ORIGIN
        );
    }

    #[test]
    fn test_surface_origin_override() {
        let config = Config {
            surface_origin: Some("https://editor.example.com:8443/path".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.resolved_surface_origin().unwrap(),
            "https://editor.example.com:8443"
        );
    }

    #[test]
    fn test_env_override_editor_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CODEDOCK_LANGUAGE", "python");
        env::set_var("CODEDOCK_THEME", "light");
        env::set_var("CODEDOCK_FONT_SIZE", "64");
        config.apply_env_overrides();

        assert_eq!(config.language, Language::Python);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.font_size.get(), 32);
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CODEDOCK_LANGUAGE", "cobol");
        env::set_var("CODEDOCK_FONT_SIZE", "big");
        config.apply_env_overrides();

        assert_eq!(config.language, Language::Java);
        assert_eq!(config.font_size.get(), 22);
    }

    #[test]
    fn test_env_override_surface_origin() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CODEDOCK_SURFACE_ORIGIN", "https://onecompiler.com");
        config.apply_env_overrides();
        assert_eq!(
            config.surface_origin,
            Some("https://onecompiler.com".to_string())
        );

        // Empty string clears it
        env::set_var("CODEDOCK_SURFACE_ORIGIN", "");
        config.apply_env_overrides();
        assert!(config.surface_origin.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/codedock"),
            language: Language::C,
            theme: Theme::Light,
            font_size: FontSize::new(14),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("language = \"c\""));
        assert!(toml_str.contains("theme = \"light\""));
        assert!(toml_str.contains("font_size = 14"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.language, Language::C);
        assert_eq!(parsed.font_size.get(), 14);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            surface_url = "ws://localhost:4000/embed"
            language = "javascript"
            ready_timeout_secs = 0
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.language, Language::JavaScript);
        assert_eq!(config.theme, Theme::Dark);
        assert!(config.ready_timeout().is_none());
    }

    #[test]
    fn test_load_from_str_rejects_bad_surface_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        assert!(Config::load_from_str(r#"surface_url = "not a url""#).is_err());
        assert!(Config::load_from_str(r#"surface_url = "mailto:someone""#).is_err());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("CODEDOCK_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.language, Language::Java);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            theme: Theme::Light,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.theme, Theme::Light);
        assert_eq!(loaded.data_dir, temp_dir.path().join("data"));
    }
}
