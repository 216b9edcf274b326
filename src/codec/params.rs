//! Parameter types for codec operations.
//!
//! - [`OutputFormat`]: output container, with `Jpeg` as the named default.
//! - [`Quality`]: encoder quality, stored exactly as requested.
//! - [`Rgb`]: solid colour for tinting and flattening.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container for the terminal encode stage.
///
/// Parsing never fails: `"jpeg"`/`"jpg"` and `"png"` are recognised
/// (case-insensitive) and anything else resolves to [`OutputFormat::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Explicit fallback for unrecognised format names.
    pub const DEFAULT: OutputFormat = OutputFormat::Jpeg;

    /// Resolve a user-supplied format name.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "png" => OutputFormat::Png,
            _ => Self::DEFAULT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    /// File extension used for stored output.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl From<String> for OutputFormat {
    fn from(value: String) -> Self {
        OutputFormat::parse(&value)
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder quality as requested by the caller.
///
/// Out-of-range values are kept verbatim; only [`Quality::encoder_value`]
/// saturates them into the 1-100 range the encoders accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub i32);

impl Quality {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn encoder_value(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// An opaque 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    /// Tint applied on top of grayscale for the sepia filter.
    pub const SEPIA: Rgb = Rgb::new(112, 66, 20);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Rec. 601 luma of the colour, 0.0-255.0.
    pub fn luma(self) -> f32 {
        0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_recognises_aliases() {
        assert_eq!(OutputFormat::parse("JPG"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("jpeg"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse(" png "), OutputFormat::Png);
    }

    #[test]
    fn test_format_parse_falls_back_to_named_default() {
        assert_eq!(OutputFormat::parse("tiff"), OutputFormat::DEFAULT);
        assert_eq!(OutputFormat::parse(""), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::default(), OutputFormat::DEFAULT);
    }

    #[test]
    fn test_format_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&OutputFormat::Png).unwrap();
        assert_eq!(json, "\"png\"");
        let parsed: OutputFormat = serde_json::from_str("\"webp\"").unwrap();
        assert_eq!(parsed, OutputFormat::Jpeg);
    }

    #[test]
    fn test_quality_passes_through_but_encoder_saturates() {
        let q = Quality::new(150);
        assert_eq!(q.value(), 150);
        assert_eq!(q.encoder_value(), 100);
        assert_eq!(Quality::new(-3).encoder_value(), 1);
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn test_sepia_luma_is_positive() {
        assert!(Rgb::SEPIA.luma() > 70.0 && Rgb::SEPIA.luma() < 80.0);
        assert_eq!(Rgb::WHITE.luma().round(), 255.0);
    }
}
