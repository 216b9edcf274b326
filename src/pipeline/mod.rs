//! # Pipeline Module
//!
//! Modulo che separa la pipeline di trasformazione in sottomoduli:
//! - `options`: Snapshot tipizzato delle opzioni (salvato nel record)
//! - `stage`: Nomi degli stage, usati negli errori
//! - `transform`: Esecuzione ordinata degli stage

pub mod options;
pub mod stage;
pub mod transform;

pub use options::{Filter, ProcessingOptions, ResizeTarget};
pub use stage::PipelineStage;
pub use transform::{process, ProcessedImage};
