//! Export subsystem
//!
//! Turns a snapshot of the editor into a downloadable artifact: either the
//! raw code as a text file or a PNG rendering of it. Everything here is
//! stateless; the controller hands over an `ExportSnapshot` and gets back
//! an `Artifact` it may write with `save_artifact`.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use thiserror::Error;
use tracing::debug;

use crate::models::{EditorState, FontSize, Language, Theme};
use crate::storage::{atomic_write, StorageError};

/// Outer padding around the rendered text, in pixels
const PADDING: u32 = 20;

/// Corner radius of the rendered card, in pixels
const CORNER_RADIUS: u32 = 10;

/// Glyph size of the bitmap font
const GLYPH_SIZE: u32 = 8;

/// Largest accepted image side, in pixels
pub const MAX_IMAGE_SIDE: u32 = 16384;

const TAB_WIDTH: usize = 4;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No code to export")]
    EmptyCode,

    #[error("Image would be {width}x{height}px, larger than {MAX_IMAGE_SIDE}px on a side")]
    TooLarge { width: u64, height: u64 },

    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything an export needs, copied out of the editor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSnapshot {
    pub code: String,
    pub document_name: String,
    pub language: Language,
    pub theme: Theme,
    pub font_size: FontSize,
}

impl ExportSnapshot {
    pub fn from_state(state: &EditorState) -> Self {
        Self {
            code: state.code.clone(),
            document_name: state.document_name.clone(),
            language: state.language,
            theme: state.theme,
            font_size: state.font_size,
        }
    }

    /// Filename for a file export
    ///
    /// Only the final path component of the document name is used; an empty
    /// name falls back to `code.<ext>`.
    pub fn file_name(&self) -> String {
        Path::new(self.document_name.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("code.{}", self.language.extension()))
    }

    /// Filename for an image export
    pub fn image_name(&self) -> String {
        format!("{}.png", self.file_name())
    }
}

/// A produced download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Render the artifact as a `data:` URL
    pub fn data_url(&self) -> String {
        data_url(self.mime_type, &self.bytes)
    }
}

/// Encode bytes as a base64 `data:` URL
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Export the code as a text file, byte for byte
pub fn export_file(snapshot: &ExportSnapshot) -> Artifact {
    Artifact {
        file_name: snapshot.file_name(),
        mime_type: "text/plain",
        bytes: snapshot.code.as_bytes().to_vec(),
    }
}

/// Export the code as a PNG image
///
/// Whitespace-only code is rejected.
pub fn export_image(snapshot: &ExportSnapshot) -> Result<Artifact, ExportError> {
    if snapshot.code.trim().is_empty() {
        return Err(ExportError::EmptyCode);
    }

    let raster = rasterize(&snapshot.code, snapshot.theme, snapshot.font_size)?;
    let bytes = raster.encode_png()?;
    debug!(
        "Rendered {}x{} image for {}",
        raster.width,
        raster.height,
        snapshot.document_name
    );

    Ok(Artifact {
        file_name: snapshot.image_name(),
        mime_type: "image/png",
        bytes,
    })
}

/// Write an artifact into `dir`, returning its path
pub fn save_artifact(dir: &Path, artifact: &Artifact) -> Result<PathBuf, ExportError> {
    let path = dir.join(&artifact.file_name);
    atomic_write(&path, &artifact.bytes)?;
    Ok(path)
}

/// Text and background colors for a theme, as RGB
fn palette(theme: Theme) -> ([u8; 3], [u8; 3]) {
    match theme {
        Theme::Dark => ([0xFF, 0xFF, 0xFF], [0x24, 0x24, 0x2B]),
        Theme::Light => ([0x00, 0x00, 0x00], [0xF5, 0xF5, 0xF5]),
    }
}

/// An RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Raster {
    fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = [rgb[0], rgb[1], rgb[2], 0xFF].repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = self.offset(x, y);
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[offset..offset + 4]);
        px
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                let offset = self.offset(px, py);
                self.pixels[offset..offset + 4].copy_from_slice(&rgba);
            }
        }
    }

    /// Draw one glyph with its top-left corner at (x, y)
    fn draw_glyph(&mut self, x: u32, y: u32, ch: char, scale: u32, rgb: [u8; 3]) {
        let bitmap = glyph(ch);
        let color = [rgb[0], rgb[1], rgb[2], 0xFF];

        for (row_idx, &row_data) in bitmap.iter().enumerate() {
            for col_idx in 0..GLYPH_SIZE {
                // Bit 0 is the leftmost pixel
                if (row_data >> col_idx) & 1 == 1 {
                    self.fill_rect(
                        x + col_idx * scale,
                        y + row_idx as u32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }

    /// Make everything outside the rounded corners transparent
    fn round_corners(&mut self, radius: u32) {
        let radius = radius.min(self.width / 2).min(self.height / 2);
        if radius == 0 {
            return;
        }
        let r = radius as f32;

        for dy in 0..radius {
            for dx in 0..radius {
                // Distance from the pixel center to the corner circle's center
                let fx = r - (dx as f32 + 0.5);
                let fy = r - (dy as f32 + 0.5);
                if fx * fx + fy * fy <= r * r {
                    continue;
                }
                let right = self.width - 1 - dx;
                let bottom = self.height - 1 - dy;
                for (x, y) in [(dx, dy), (right, dy), (dx, bottom), (right, bottom)] {
                    let offset = self.offset(x, y);
                    self.pixels[offset..offset + 4].copy_from_slice(&[0, 0, 0, 0]);
                }
            }
        }
    }

    /// Encode as an RGBA8 PNG
    pub fn encode_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(buf)
    }
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn expand_tabs(line: &str) -> String {
    line.replace('\t', &" ".repeat(TAB_WIDTH))
}

/// Render code as a monospace card in the theme's colors
pub fn rasterize(code: &str, theme: Theme, font_size: FontSize) -> Result<Raster, ExportError> {
    let scale = (font_size.get() / GLYPH_SIZE).max(1);
    let cell = GLYPH_SIZE * scale;
    let line_height = cell + 2 * scale;

    let lines: Vec<String> = code.lines().map(expand_tabs).collect();
    let rows = lines.len().max(1) as u64;
    let cols = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        .max(1) as u64;

    let width = 2 * u64::from(PADDING) + cols * u64::from(cell);
    let height = 2 * u64::from(PADDING) + rows * u64::from(line_height);
    if width > u64::from(MAX_IMAGE_SIDE) || height > u64::from(MAX_IMAGE_SIDE) {
        return Err(ExportError::TooLarge { width, height });
    }

    let (fg, bg) = palette(theme);
    let mut raster = Raster::filled(width as u32, height as u32, bg);

    for (row, line) in lines.iter().enumerate() {
        let y = PADDING + row as u32 * line_height + scale;
        for (col, ch) in line.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            let x = PADDING + col as u32 * cell;
            raster.draw_glyph(x, y, ch, scale, fg);
        }
    }

    raster.round_corners(CORNER_RADIUS);
    Ok(raster)
}
