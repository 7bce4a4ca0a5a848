//! Data models for codedock
//!
//! Core types shared by the controller, the surface proxy and the exporters:
//! - `Language`: execution environment of the embedded surface
//! - `Theme`: color scheme of the surface and of image exports
//! - `FontSize`: bounded, stepped font size
//! - `SurfaceConfig`: everything that is baked into a surface's target reference
//! - `EditorState`: the authoritative editor state owned by the controller

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a model value from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseModelError {
    #[error("Unknown language '{0}'. Valid languages: javascript, python, java, c")]
    Language(String),

    #[error("Unknown theme '{0}'. Valid themes: dark, light")]
    Theme(String),
}

/// Languages supported by the embedded surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    #[default]
    Java,
    C,
}

impl Language {
    /// All languages, in menu order
    pub const ALL: [Language; 4] = [
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::C,
    ];

    /// Identifier used on the wire and in the surface URL
    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
        }
    }

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
        }
    }

    /// Source file extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            Language::JavaScript => "js",
            Language::Python => "py",
            Language::Java => "java",
            Language::C => "c",
        }
    }

    /// Document name used until the surface reports its own
    pub fn default_document_name(self) -> String {
        format!("main.{}", self.extension())
    }

    /// Next language in menu order (wrapping)
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous language in menu order (wrapping)
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            _ => Err(ParseModelError::Language(s.to_string())),
        }
    }
}

/// Color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// The other theme
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err(ParseModelError::Theme(s.to_string())),
        }
    }
}

/// Font size in pixels, always within `[MIN, MAX]` and on a `STEP` boundary
///
/// Out-of-range values clamp silently; off-step values round down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct FontSize(u32);

impl FontSize {
    pub const MIN: u32 = 8;
    pub const MAX: u32 = 32;
    pub const STEP: u32 = 2;
    pub const DEFAULT: u32 = 22;

    pub fn new(px: u32) -> Self {
        let px = px.clamp(Self::MIN, Self::MAX);
        Self(px - (px - Self::MIN) % Self::STEP)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Apply a signed delta, clamping to the valid range
    pub fn offset(self, delta: i32) -> Self {
        let px = (i64::from(self.0) + i64::from(delta)).clamp(0, i64::from(u32::MAX));
        Self::new(px as u32)
    }

    pub fn increased(self) -> Self {
        self.offset(Self::STEP as i32)
    }

    pub fn decreased(self) -> Self {
        self.offset(-(Self::STEP as i32))
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<u32> for FontSize {
    fn from(px: u32) -> Self {
        Self::new(px)
    }
}

impl From<FontSize> for u32 {
    fn from(size: FontSize) -> Self {
        size.0
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// Configuration baked into a surface instance's target reference
///
/// Changing any field requires tearing down and recreating the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceConfig {
    pub language: Language,
    pub theme: Theme,
    pub font_size: FontSize,
}

/// Authoritative editor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    /// Current document contents
    pub code: String,
    pub language: Language,
    pub theme: Theme,
    pub font_size: FontSize,
    /// Filename associated with the code
    pub document_name: String,
    /// True only once the current surface instance reported ready
    pub surface_ready: bool,
}

impl EditorState {
    /// Create a fresh state for the given surface configuration
    pub fn new(config: SurfaceConfig) -> Self {
        Self {
            code: String::new(),
            language: config.language,
            theme: config.theme,
            font_size: config.font_size,
            document_name: config.language.default_document_name(),
            surface_ready: false,
        }
    }

    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            language: self.language,
            theme: self.theme,
            font_size: self.font_size,
        }
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(SurfaceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_round_trip_names() {
        for lang in Language::ALL {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
        assert_eq!("JS".parse::<Language>().unwrap(), Language::JavaScript);
        assert!("rust".parse::<Language>().is_err());
    }

    #[test]
    fn test_default_document_names() {
        assert_eq!(Language::JavaScript.default_document_name(), "main.js");
        assert_eq!(Language::Python.default_document_name(), "main.py");
        assert_eq!(Language::Java.default_document_name(), "main.java");
        assert_eq!(Language::C.default_document_name(), "main.c");
    }

    #[test]
    fn test_language_cycle() {
        assert_eq!(Language::C.next(), Language::JavaScript);
        assert_eq!(Language::JavaScript.prev(), Language::C);
        assert_eq!(Language::Python.next().prev(), Language::Python);
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
    }

    #[test]
    fn test_font_size_clamps() {
        assert_eq!(FontSize::new(2).get(), 8);
        assert_eq!(FontSize::new(99).get(), 32);
        assert_eq!(FontSize::default().get(), 22);
        assert_eq!(FontSize::new(8).offset(-100).get(), 8);
        assert_eq!(FontSize::new(20).offset(4).get(), 24);
    }

    #[test]
    fn test_font_size_converges_at_bounds() {
        let mut size = FontSize::new(30);
        for _ in 0..5 {
            size = size.increased();
            assert!(size.get() <= FontSize::MAX);
        }
        assert_eq!(size.get(), 32);

        let mut size = FontSize::new(10);
        for _ in 0..5 {
            size = size.decreased();
            assert!(size.get() >= FontSize::MIN);
        }
        assert_eq!(size.get(), 8);
    }

    #[test]
    fn test_font_size_snaps_to_step() {
        assert_eq!(FontSize::new(23).get(), 22);
        assert_eq!(FontSize::new(9).get(), 8);
        assert_eq!(FontSize::new(31).get(), 30);

        let mut size = FontSize::new(23);
        let mut seen = vec![size.get()];
        while size.increased() != size {
            size = size.increased();
            seen.push(size.get());
        }
        assert_eq!(seen, vec![22, 24, 26, 28, 30, 32]);

        let size: FontSize = serde_json::from_str("25").unwrap();
        assert_eq!(size.get(), 24);
    }

    #[test]
    fn test_font_size_deserialize_clamps() {
        let size: FontSize = serde_json::from_str("40").unwrap();
        assert_eq!(size.get(), 32);
    }

    #[test]
    fn test_editor_state_defaults() {
        let state = EditorState::default();
        assert_eq!(state.language, Language::Java);
        assert_eq!(state.theme, Theme::Dark);
        assert_eq!(state.font_size.get(), 22);
        assert_eq!(state.document_name, "main.java");
        assert!(state.code.is_empty());
        assert!(!state.surface_ready);
    }
}
