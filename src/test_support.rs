//! Shared fixtures for the test suite.
//!
//! Images are generated in memory so tests never depend on files on disk.

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage, RgbImage};
use std::io::Cursor;

/// RGB image with a diagonal gradient, so every pixel differs.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    }))
}

/// RGBA image: left half fully transparent, right half opaque red.
pub fn half_transparent_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 255, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    }))
}

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
    cursor.into_inner()
}

pub fn encode_jpeg(image: &DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(90))
        .unwrap();
    cursor.into_inner()
}
