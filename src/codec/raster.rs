//! In-memory raster codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image::guess_format` + `image::load_from_memory_with_format` |
//! | Sharpen | `DynamicImage::unsharpen` |
//! | Grayscale / blur | `DynamicImage::grayscale` / `DynamicImage::blur` |
//! | Tint | per-pixel luma scaling |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Rotate (quarter turns) | `rotate90` / `rotate180` / `rotate270` |
//! | Rotate (other angles) | `imageproc::geometric_transformations::rotate_about_center` on a padded canvas |
//! | Flatten | per-pixel alpha compositing |
//! | Encode | `JpegEncoder` (RGB8) / `PngEncoder` (best compression) |

use super::backend::{CodecError, DecodedImage, ImageCodec};
use super::params::{OutputFormat, Quality, Rgb};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, Rgba, RgbaImage, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::borrow::Cow;
use tracing::debug;

/// Largest accepted edge for any geometry-producing operation.
const MAX_DIMENSION: u32 = 16384;
/// 256 megapixels.
const MAX_PIXELS: u64 = 256_000_000;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn new() -> Self {
        Self
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

fn check_geometry(width: u32, height: u32) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidGeometry(format!(
            "target {}x{} has zero area",
            width, height
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CodecError::InvalidGeometry(format!(
            "target {}x{} exceeds maximum edge of {}",
            width, height, MAX_DIMENSION
        )));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(CodecError::InvalidGeometry(format!(
            "target {}x{} exceeds the {} MP limit",
            width,
            height,
            MAX_PIXELS / 1_000_000
        )));
    }
    Ok(())
}

/// Scale `other` by `target / base`, never collapsing to zero.
fn scale_edge(other: u32, target: u32, base: u32) -> u32 {
    let scaled = (other as f64 * target as f64 / base as f64).round() as u32;
    scaled.max(1)
}

/// Resolve the final dimensions of an exact-fit resize.
pub(crate) fn target_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(u32, u32), CodecError> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return Err(CodecError::InvalidGeometry("source image is empty".to_string()));
    }

    let target = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(0), None) | (None, Some(0)) => (0, 0),
        (Some(w), None) => (w, scale_edge(src_h, w, src_w)),
        (None, Some(h)) => (scale_edge(src_w, h, src_h), h),
        (None, None) => source,
    };

    check_geometry(target.0, target.1)?;
    Ok(target)
}

/// Bounds of a `w`x`h` rectangle rotated by `theta` radians.
fn rotated_bounds(w: u32, h: u32, theta: f32) -> (u32, u32) {
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (w as f32, h as f32);
    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;
    (out_w, out_h)
}

/// Rotate by a non-quarter-turn angle, growing the canvas to fit.
fn rotate_free(image: &DynamicImage, degrees: i32) -> Result<DynamicImage, CodecError> {
    let rgba = image.to_rgba8();
    let theta = (degrees as f32).to_radians();
    let (out_w, out_h) = rotated_bounds(rgba.width(), rgba.height(), theta);
    check_geometry(out_w, out_h)?;

    // Canvas abbastanza grande da contenere sia l'originale sia il risultato
    let canvas_w = out_w.max(rgba.width());
    let canvas_h = out_h.max(rgba.height());
    check_geometry(canvas_w, canvas_h)?;

    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, TRANSPARENT);
    imageops::overlay(
        &mut canvas,
        &rgba,
        ((canvas_w - rgba.width()) / 2) as i64,
        ((canvas_h - rgba.height()) / 2) as i64,
    );

    let rotated = rotate_about_center(&canvas, theta, Interpolation::Bilinear, TRANSPARENT);
    let cropped = imageops::crop_imm(
        &rotated,
        (canvas_w - out_w) / 2,
        (canvas_h - out_h) / 2,
        out_w,
        out_h,
    )
    .to_image();

    Ok(DynamicImage::ImageRgba8(cropped))
}

fn scale_channel(channel: u8, scale: f32) -> u8 {
    (channel as f32 * scale).round().clamp(0.0, 255.0) as u8
}

/// Encoders only take 8-bit buffers; 16-bit and float images are narrowed.
fn to_eight_bit(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let format = image::guess_format(bytes)
            .map_err(|e| CodecError::UnsupportedFormat(format!("unrecognised image data: {}", e)))?;
        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            CodecError::UnsupportedFormat(format!("failed to decode {:?}: {}", format, e))
        })?;

        let (width, height) = (image.width(), image.height());
        debug!("Decoded {:?} image {}x{}", format, width, height);

        Ok(DecodedImage {
            image,
            format: format_name(format),
            width,
            height,
        })
    }

    fn sharpen(&self, image: DynamicImage, sigma: f32) -> Result<DynamicImage, CodecError> {
        Ok(image.unsharpen(sigma, 0))
    }

    fn to_grayscale(&self, image: DynamicImage) -> Result<DynamicImage, CodecError> {
        Ok(image.grayscale())
    }

    fn blur(&self, image: DynamicImage, sigma: f32) -> Result<DynamicImage, CodecError> {
        Ok(image.blur(sigma))
    }

    fn tint(&self, image: DynamicImage, color: Rgb) -> Result<DynamicImage, CodecError> {
        let had_alpha = image.color().has_alpha();
        let tint_luma = color.luma().max(1.0);

        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let luma = Rgb::new(r, g, b).luma();
            let scale = luma / tint_luma;
            pixel.0 = [
                scale_channel(color.r, scale),
                scale_channel(color.g, scale),
                scale_channel(color.b, scale),
                a,
            ];
        }

        let tinted = DynamicImage::ImageRgba8(rgba);
        if had_alpha {
            Ok(tinted)
        } else {
            Ok(DynamicImage::ImageRgb8(tinted.to_rgb8()))
        }
    }

    fn resize_exact(
        &self,
        image: DynamicImage,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<DynamicImage, CodecError> {
        let (w, h) = target_dimensions((image.width(), image.height()), width, height)?;
        debug!("Resizing {}x{} -> {}x{}", image.width(), image.height(), w, h);
        Ok(image.resize_exact(w, h, FilterType::Lanczos3))
    }

    fn rotate(&self, image: DynamicImage, degrees: i32) -> Result<DynamicImage, CodecError> {
        match degrees.rem_euclid(360) {
            0 => Ok(image),
            90 => Ok(image.rotate90()),
            180 => Ok(image.rotate180()),
            270 => Ok(image.rotate270()),
            other => rotate_free(&image, other),
        }
    }

    fn flatten(&self, image: DynamicImage, background: Rgb) -> Result<DynamicImage, CodecError> {
        if !image.color().has_alpha() {
            return Ok(image);
        }

        let rgba = image.to_rgba8();
        let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let alpha = a as f32 / 255.0;
            let blend = |fg: u8, bg: u8| -> u8 {
                (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8
            };
            image::Rgb([blend(r, background.r), blend(g, background.g), blend(b, background.b)])
        });

        Ok(DynamicImage::ImageRgb8(flat))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                // JPEG non ha canale alpha
                let rgb = image.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.encoder_value());
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(|e| CodecError::Failed(format!("JPEG encode failed: {}", e)))?;
            }
            OutputFormat::Png => {
                let narrowed = to_eight_bit(image);
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    CompressionType::Best,
                    PngFilterType::Adaptive,
                );
                encoder
                    .write_image(
                        narrowed.as_bytes(),
                        narrowed.width(),
                        narrowed.height(),
                        narrowed.color(),
                    )
                    .map_err(|e| CodecError::Failed(format!("PNG encode failed: {}", e)))?;
            }
        }

        debug!("Encoded {} ({} bytes)", format, buffer.len());
        Ok(buffer)
    }
}
