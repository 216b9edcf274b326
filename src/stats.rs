//! # Stats Aggregator
//!
//! Statistiche aggregate per utente.
//!
//! ## Statistiche calcolate:
//! - **total_images**: Record dell'utente
//! - **completed_images** / **failed_images**: Record per stato
//! - **total_original_bytes**: Somma delle dimensioni originali
//! - **total_processed_bytes**: Somma degli output elaborati
//! - **total_saved**: `max(0, original - processed)`, mai negativo
//!
//! Tutte le query sono limitate al proprietario richiesto e vengono
//! eseguite in parallelo sul record store.

use crate::error::Result;
use crate::record::{OwnerId, RecordStatus};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};

/// Aggregate counters for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_images: u64,
    pub completed_images: u64,
    pub failed_images: u64,
    pub total_original_bytes: u64,
    pub total_processed_bytes: u64,
    pub total_saved: u64,
}

impl UserStats {
    pub fn new(
        total_images: u64,
        completed_images: u64,
        failed_images: u64,
        total_original_bytes: u64,
        total_processed_bytes: u64,
    ) -> Self {
        Self {
            total_images,
            completed_images,
            failed_images,
            total_original_bytes,
            total_processed_bytes,
            // Processed output can be larger than the original; clamp for display
            total_saved: total_original_bytes.saturating_sub(total_processed_bytes),
        }
    }

    /// Saved bytes as a share of all original bytes.
    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_bytes > 0 {
            (self.total_saved as f64 / self.total_original_bytes as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Images: {} | Completed: {} | Failed: {} | Original: {} | Processed: {} | Total saved: {} ({:.2}%)",
            self.total_images,
            self.completed_images,
            self.failed_images,
            format_size(self.total_original_bytes),
            format_size(self.total_processed_bytes),
            format_size(self.total_saved),
            self.overall_reduction_percent()
        )
    }
}

/// Compute the stats of `owner` from the record store.
pub async fn compute_stats(records: &dyn RecordStore, owner: &OwnerId) -> Result<UserStats> {
    let (total, completed, failed, sizes) = futures::try_join!(
        records.count(owner, None),
        records.count(owner, Some(RecordStatus::Completed)),
        records.count(owner, Some(RecordStatus::Failed)),
        records.sum_sizes(owner),
    )?;

    Ok(UserStats::new(total, completed, failed, sizes.original, sizes.processed))
}

/// Format a byte count in human readable units (B, KB, MB, ...).
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
