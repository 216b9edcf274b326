//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `StudioError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Separa gli errori visibili all'utente da quelli dei collaboratori esterni
//!
//! ## Categorie di errori:
//! - `Unauthorized`: Credenziale assente o non valida
//! - `NotFound`: Record inesistente *oppure* appartenente a un altro utente
//! - `UnsupportedFormat`: Byte stream o formato di destinazione non riconosciuto
//! - `PayloadTooLarge`: Upload oltre il limite configurato
//! - `Processing`: Fallimento di uno stage della pipeline (con nome dello stage)
//! - `Timeout`: Elaborazione interrotta dal timeout di supervisione
//! - `Storage` / `Io` / `Serialization`: Errori dei collaboratori di storage
//! - `Task`: Task in background terminato con panic o cancellato
//!
//! ## Esempio:
//! ```ignore
//! let record = store.find(id, &owner).await?.ok_or(StudioError::NotFound)?;
//! ```

use crate::pipeline::PipelineStage;
use std::time::Duration;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Custom error types for the image studio
#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    #[error("Not authorized")]
    Unauthorized,

    /// Covers both a missing record and a record owned by someone else.
    #[error("Image not found")]
    NotFound,

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Payload too large: {size} bytes (limit {limit} bytes)")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Processing failed at stage '{stage}': {message}")]
    Processing { stage: PipelineStage, message: String },

    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StudioError {
    /// Terminal errors are never worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StudioError::Storage(_) | StudioError::Io(_) | StudioError::Timeout(_))
    }

    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Unauthorized => "unauthorized",
            StudioError::NotFound => "not_found",
            StudioError::UnsupportedFormat(_) => "unsupported_format",
            StudioError::PayloadTooLarge { .. } => "payload_too_large",
            StudioError::Processing { .. } => "processing",
            StudioError::Timeout(_) => "timeout",
            StudioError::Storage(_) | StudioError::Io(_) | StudioError::Serialization(_) => "storage",
            StudioError::Task(_) => "internal",
        }
    }

    /// Stage name for processing failures, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            StudioError::Processing { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
