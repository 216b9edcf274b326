//! # Lifecycle Module
//!
//! Ciclo di vita dei record:
//! - `manager`: upload, elaborazione e cancellazione
//! - `locks`: arena di lock per-record per serializzare i tentativi

pub mod locks;
pub mod manager;

pub use locks::{RecordLockGuard, RecordLocks};
pub use manager::{ManagerLimits, RecordManager};
