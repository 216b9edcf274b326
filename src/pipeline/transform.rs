//! # Transformation Pipeline
//!
//! Applica le trasformazioni a una singola immagine in ordine fisso.
//!
//! ## Ordine degli stage (contratto, non dettaglio implementativo):
//! 1. **Enhance**: sharpen (sigma 1.5), solo se `enhance`
//! 2. **Filter**: grayscale → blur → sepia, indipendentemente dall'ordine in input.
//!    Sepia è grayscale + tint, quindi con `grayscale` + `sepia` la conversione
//!    in scala di grigi avviene due volte (idempotente)
//! 3. **Resize**: solo se width o height presenti
//! 4. **Rotate**: solo se i gradi sono diversi da zero
//! 5. **Flatten**: trasparenza su bianco, solo se `remove_background`
//! 6. **Encode**: sempre, ultimo passo irreversibile
//!
//! ## Garanzie:
//! - L'output è un'immagine valida nel formato scelto
//! - `size` è esattamente la lunghezza del buffer
//! - I byte sorgente non vengono mai modificati
//! - Un errore in qualsiasi stage interrompe la pipeline senza output parziale

use super::options::{Filter, ProcessingOptions};
use super::stage::PipelineStage;
use crate::codec::{CodecError, ImageCodec, OutputFormat, Rgb};
use crate::error::{Result, StudioError};
use tracing::debug;

/// Sigma of the fixed enhance sharpening.
pub const ENHANCE_SIGMA: f32 = 1.5;
/// Sigma of the blur filter.
pub const BLUR_SIGMA: f32 = 3.0;

/// Encoded result of a pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// Exact byte length of `bytes`
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

fn stage_error(stage: PipelineStage) -> impl Fn(CodecError) -> StudioError {
    move |err| match err {
        CodecError::UnsupportedFormat(message) => StudioError::UnsupportedFormat(message),
        other => StudioError::Processing {
            stage,
            message: other.to_string(),
        },
    }
}

/// Run every stage against `source` and return the encoded output.
pub fn process(
    codec: &dyn ImageCodec,
    source: &[u8],
    options: &ProcessingOptions,
) -> Result<ProcessedImage> {
    let decoded = codec.decode(source).map_err(stage_error(PipelineStage::Decode))?;
    let mut image = decoded.image;
    debug!("Pipeline start: {}x{} {} [{}]", decoded.width, decoded.height, decoded.format, options.describe());

    if options.enhance {
        image = codec
            .sharpen(image, ENHANCE_SIGMA)
            .map_err(stage_error(PipelineStage::Enhance))?;
    }

    // Sotto-ordine fisso dei filtri
    if options.has_filter(&Filter::Grayscale) {
        image = codec.to_grayscale(image).map_err(stage_error(PipelineStage::Filter))?;
    }
    if options.has_filter(&Filter::Blur) {
        image = codec
            .blur(image, BLUR_SIGMA)
            .map_err(stage_error(PipelineStage::Filter))?;
    }
    if options.has_filter(&Filter::Sepia) {
        image = codec.to_grayscale(image).map_err(stage_error(PipelineStage::Filter))?;
        image = codec
            .tint(image, Rgb::SEPIA)
            .map_err(stage_error(PipelineStage::Filter))?;
    }

    if let Some(target) = options.active_resize() {
        image = codec
            .resize_exact(image, target.width, target.height)
            .map_err(stage_error(PipelineStage::Resize))?;
    }

    if options.rotate != 0 {
        image = codec
            .rotate(image, options.rotate)
            .map_err(stage_error(PipelineStage::Rotate))?;
    }

    if options.remove_background {
        image = codec
            .flatten(image, Rgb::WHITE)
            .map_err(stage_error(PipelineStage::Flatten))?;
    }

    let bytes = codec
        .encode(&image, options.format, options.quality)
        .map_err(stage_error(PipelineStage::Encode))?;

    let size = bytes.len() as u64;
    debug!("Pipeline done: {}x{} {} ({} bytes)", image.width(), image.height(), options.format, size);

    Ok(ProcessedImage {
        bytes,
        format: options.format,
        size,
        width: image.width(),
        height: image.height(),
    })
}
