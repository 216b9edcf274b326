//! # Image Studio Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `codec`: Adapter verso la libreria di imaging (decode, filtri, encode)
//! - `pipeline`: Pipeline di trasformazione con ordine fisso degli stage
//! - `record`: Modello del record di metadati
//! - `store`: Byte store e record store
//! - `lifecycle`: Upload, elaborazione e cancellazione dei record
//! - `stats`: Statistiche aggregate per utente
//! - `auth`: Risoluzione dei bearer token
//! - `service`: Operazioni esposte (upload, process, history, delete, stats, export)
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `json_output`: Output JSON della CLI
//!
//! ## Utilizzo:
//! ```ignore
//! use image_studio::{Config, ImageService, ProcessingOptions};
//!
//! let config = Config::from_file(&Config::default_path()).await?;
//! let service = ImageService::open(&config).await?;
//! let owner = service.authenticate(&token).await?;
//! let upload = service.upload(&owner, "photo.jpg", bytes).await?;
//! let summary = service.process(upload.id, &owner, ProcessingOptions::default()).await?;
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod json_output;
pub mod lifecycle;
pub mod pipeline;
pub mod record;
pub mod service;
pub mod stats;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{Authenticator, TokenAuthenticator};
pub use codec::{ImageCodec, OutputFormat, Quality, RasterCodec};
pub use config::Config;
pub use error::{Result, StudioError};
pub use json_output::JsonMessage;
pub use lifecycle::{ManagerLimits, RecordManager};
pub use pipeline::{Filter, PipelineStage, ProcessingOptions, ResizeTarget};
pub use record::{ImageRecord, OwnerId, RecordId, RecordStatus};
pub use service::{
    parse_record_id, HistoryEntry, HistoryPage, ImageService, Pagination, ProcessSummary,
    UploadSummary,
};
pub use stats::{format_size, UserStats};
pub use store::{ByteStore, FsByteStore, JsonRecordStore, RecordStore};
