//! # Store Module
//!
//! Collaboratori di storage usati dal lifecycle manager:
//! - `bytes`: contenuto binario delle immagini (`ByteStore`)
//! - `records`: metadati dei record (`RecordStore`)
//!
//! Entrambi sono trait async, così il manager può lavorare con backend
//! diversi (filesystem, mock nei test) senza cambiare.

pub mod bytes;
pub mod records;

pub use bytes::{ByteStore, FsByteStore};
pub use records::{JsonRecordStore, RecordStore, SizeTotals};
