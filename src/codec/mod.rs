//! # Image Codec Module
//!
//! Questo modulo incapsula la libreria di imaging dietro un'interfaccia minima.
//!
//! ## Responsabilità:
//! - Decode dei byte caricati con estrazione di formato e dimensioni
//! - Operazioni pixel del menu di trasformazione (sharpen, grayscale, blur, tint)
//! - Geometria: resize esatto e rotazione di angoli arbitrari
//! - Flatten della trasparenza su colore pieno
//! - Encode finale in JPEG o PNG
//!
//! ## Struttura:
//! - `backend`: trait [`ImageCodec`] + `CodecError` + mock per i test
//! - `params`: [`OutputFormat`], [`Quality`], [`Rgb`]
//! - `raster`: [`RasterCodec`], implementazione pure-Rust su `image` + `imageproc`

pub mod backend;
mod params;
pub mod raster;

pub use backend::{CodecError, DecodedImage, ImageCodec};
pub use params::{OutputFormat, Quality, Rgb};
pub use raster::RasterCodec;
