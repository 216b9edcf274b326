//! Codec capability trait and shared types.
//!
//! [`ImageCodec`] is the narrow surface the pipeline and the lifecycle
//! manager need from an image library: decode with metadata, the pixel
//! operations of the transformation menu, and encode. Image handles are
//! plain [`DynamicImage`] values, so every operation takes ownership of its
//! input and returns a new handle.
//!
//! The production implementation is [`RasterCodec`](super::raster::RasterCodec).

use super::params::{OutputFormat, Quality, Rgb};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Codec operation failed: {0}")]
    Failed(String),
}

/// A decoded image plus the metadata captured at upload time.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Lowercase container name, e.g. `"jpeg"`, `"png"`, `"webp"`.
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Capability interface over an image codec/filter library.
pub trait ImageCodec: Send + Sync {
    /// Decode raw bytes. Fails with `UnsupportedFormat` for anything that is
    /// not a recognised raster format.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;

    /// Unsharp mask with the given gaussian sigma.
    fn sharpen(&self, image: DynamicImage, sigma: f32) -> Result<DynamicImage, CodecError>;

    fn to_grayscale(&self, image: DynamicImage) -> Result<DynamicImage, CodecError>;

    /// Gaussian blur with the given sigma.
    fn blur(&self, image: DynamicImage, sigma: f32) -> Result<DynamicImage, CodecError>;

    /// Recolour each pixel with `color`, keeping its luminance.
    fn tint(&self, image: DynamicImage, color: Rgb) -> Result<DynamicImage, CodecError>;

    /// Fit to exact dimensions. An omitted dimension is derived from the
    /// source aspect ratio; zero dimensions are invalid geometry.
    fn resize_exact(
        &self,
        image: DynamicImage,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<DynamicImage, CodecError>;

    /// Clockwise rotation by arbitrary integer degrees. The canvas grows to
    /// contain the rotated image.
    fn rotate(&self, image: DynamicImage, degrees: i32) -> Result<DynamicImage, CodecError>;

    /// Composite any transparency onto a solid background.
    fn flatten(&self, image: DynamicImage, background: Rgb) -> Result<DynamicImage, CodecError>;

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;
}
