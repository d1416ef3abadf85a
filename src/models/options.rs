//! Conversion options parsed from the multipart form fields.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_QUALITY: u8 = 82;
pub const DEFAULT_PNG_COMPRESSION: u8 = 9;
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Output encoding requested for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Webp,
    Jpg,
    Png,
    Heic,
}

impl TargetFormat {
    /// File extension written for this format; ImageMagick picks the
    /// encoder from it.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Heic => "heic",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            "png" => Ok(TargetFormat::Png),
            "heic" | "heif" => Ok(TargetFormat::Heic),
            "webp" => Ok(TargetFormat::Webp),
            other => Err(OptionsError::UnsupportedTarget(other.to_string())),
        }
    }
}

/// Which endpoint accepted the batch. Decides the archive name and the
/// user-facing failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// `POST /api/webp`
    Compress,
    /// `POST /api/convert`
    Convert,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unsupported target format `{0}`")]
    UnsupportedTarget(String),
    #[error("invalid resize geometry `{0}`")]
    InvalidResize(String),
}

/// Describes how every file in a batch is transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub mode: BatchMode,
    pub target: TargetFormat,
    /// Always within 0..=100.
    pub quality: u8,
    pub lossless: bool,
    /// `None` when no resize was requested.
    pub resize: Option<String>,
    pub strip: bool,
    pub background: String,
    /// Always within 0..=9.
    pub png_compression: u8,
    pub archive: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::Convert,
            target: TargetFormat::Jpg,
            quality: DEFAULT_QUALITY,
            lossless: false,
            resize: None,
            strip: true,
            background: DEFAULT_BACKGROUND.to_string(),
            png_compression: DEFAULT_PNG_COMPRESSION,
            archive: false,
        }
    }
}

impl ConversionOptions {
    /// Options for `POST /api/webp`: only `quality`, `lossless`, `resize`
    /// and `zip` are read; metadata is always stripped.
    pub fn from_webp_form(fields: &HashMap<String, String>) -> Result<Self, OptionsError> {
        let field = |name: &str| fields.get(name).map(String::as_str);
        Ok(Self {
            mode: BatchMode::Compress,
            target: TargetFormat::Webp,
            quality: clamp_quality(field("quality")),
            lossless: field("lossless") == Some("true"),
            resize: parse_resize(field("resize"))?,
            archive: field("zip") == Some("true"),
            ..Self::default()
        })
    }

    /// Options for `POST /api/convert`.
    pub fn from_convert_form(fields: &HashMap<String, String>) -> Result<Self, OptionsError> {
        let field = |name: &str| fields.get(name).map(String::as_str);
        let target = match field("target") {
            Some(raw) => raw.parse()?,
            None => TargetFormat::Jpg,
        };
        Ok(Self {
            mode: BatchMode::Convert,
            target,
            quality: clamp_quality(field("quality")),
            lossless: field("lossless") == Some("true"),
            resize: parse_resize(field("resize"))?,
            strip: field("strip") != Some("false"),
            background: parse_background(field("background")),
            png_compression: clamp_png_compression(field("pngCompression")),
            archive: field("zip") == Some("true"),
        })
    }
}

/// Clamp a free-form quality value into 0..=100. Missing, empty or
/// non-numeric input yields the default.
pub fn clamp_quality(raw: Option<&str>) -> u8 {
    clamp_number(raw, 100.0).unwrap_or(DEFAULT_QUALITY)
}

/// Clamp a PNG compression level into 0..=9.
pub fn clamp_png_compression(raw: Option<&str>) -> u8 {
    clamp_number(raw, 9.0).unwrap_or(DEFAULT_PNG_COMPRESSION)
}

fn clamp_number(raw: Option<&str>, max: f64) -> Option<u8> {
    let value = raw?.trim().parse::<f64>().ok()?;
    if value.is_nan() {
        return None;
    }
    Some(value.round().clamp(0.0, max) as u8)
}

/// Empty or whitespace-only geometry means "no resize". Anything else must
/// stay inside the geometry alphabet so it can never be read as an option.
pub fn parse_resize(raw: Option<&str>) -> Result<Option<String>, OptionsError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.starts_with('-') || !value.chars().all(is_geometry_char) {
        return Err(OptionsError::InvalidResize(value.to_string()));
    }
    Ok(Some(value.to_string()))
}

fn is_geometry_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, 'x' | 'X' | '%' | '<' | '>' | '^' | '!' | '@' | '.' | '+' | '-')
}

fn parse_background(raw: Option<&str>) -> String {
    let value = raw.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return DEFAULT_BACKGROUND.to_string();
    }
    let is_hex = value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    });
    let is_name = value.chars().all(|c| c.is_ascii_alphabetic());
    if is_hex || is_name {
        value.to_string()
    } else {
        tracing::warn!("ignoring background colour `{}`", value);
        DEFAULT_BACKGROUND.to_string()
    }
}
