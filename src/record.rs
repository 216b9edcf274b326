//! # Image Record Module
//!
//! Questo modulo definisce il record di metadati di ogni immagine caricata.
//!
//! ## Responsabilità:
//! - Identità del record (id opaco + proprietario, mai nullo)
//! - Facet originale: impostato una sola volta alla creazione, mai modificato
//! - Facet processato: scritto solo come unità (key + size + format insieme)
//! - Snapshot delle opzioni dell'ultimo tentativo (`operations`)
//! - Stato: `uploaded → processing → completed | failed`
//! - Calcolo del compression ratio
//!
//! ## Invarianti:
//! - I campi sono privati: le transizioni passano solo da `begin_attempt`,
//!   `complete` e `fail`, quindi una scrittura parziale non è rappresentabile
//! - `completed` ⟺ il facet processato viene dall'ultimo tentativo
//! - `failed` lascia il facet processato dell'ultimo successo (o vuoto)
//!
//! ## Esempio struttura record:
//! ```json
//! {
//!   "id": "6f1c...",
//!   "owner": "alice",
//!   "original": { "filename": "cat.jpg", "key": "3b2e....jpg", "size": 500000,
//!                 "format": "jpeg", "width": 1920, "height": 1080 },
//!   "processed": { "key": "9a41....png", "size": 210000, "format": "png",
//!                  "width": 800, "height": 450 },
//!   "operations": { "resize": { "width": 800, "height": null }, "format": "png", ... },
//!   "status": "completed",
//!   "created_at": "2024-05-01T10:00:00Z"
//! }
//! ```

use crate::codec::OutputFormat;
use crate::pipeline::ProcessingOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque unique record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identity of the user owning a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a blob in the byte store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Uploaded => "uploaded",
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was uploaded. Written once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalFacet {
    /// User-supplied and untrusted; never used to build paths
    pub filename: String,
    pub key: StorageKey,
    pub size: u64,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Output of the last successful processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFacet {
    pub key: StorageKey,
    pub size: u64,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Persisted metadata describing one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    id: RecordId,
    owner: OwnerId,
    original: OriginalFacet,
    processed: Option<ProcessedFacet>,
    operations: Option<ProcessingOptions>,
    status: RecordStatus,
    created_at: DateTime<Utc>,
    /// Start of the latest processing attempt
    #[serde(default)]
    attempt_started_at: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// New record in `uploaded` state.
    pub fn new(owner: OwnerId, original: OriginalFacet) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            original,
            processed: None,
            operations: None,
            status: RecordStatus::Uploaded,
            created_at: Utc::now(),
            attempt_started_at: None,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn original(&self) -> &OriginalFacet {
        &self.original
    }

    pub fn processed(&self) -> Option<&ProcessedFacet> {
        self.processed.as_ref()
    }

    pub fn operations(&self) -> Option<&ProcessingOptions> {
        self.operations.as_ref()
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner == owner
    }

    pub fn attempt_started_at(&self) -> Option<DateTime<Utc>> {
        self.attempt_started_at
    }

    /// True for a record stuck in `processing` longer than `timeout`.
    ///
    /// Records without a start time (written before it was tracked) count
    /// as expired.
    pub fn is_attempt_expired(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        if self.status != RecordStatus::Processing {
            return false;
        }
        let Some(started) = self.attempt_started_at else {
            return true;
        };
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => now - started > timeout,
            Err(_) => false,
        }
    }

    /// Enter `processing`, overwriting the options snapshot.
    pub(crate) fn begin_attempt(&mut self, options: ProcessingOptions) {
        self.operations = Some(options);
        self.status = RecordStatus::Processing;
        self.attempt_started_at = Some(Utc::now());
    }

    /// Attach a new processed facet as a unit. Returns the facet it replaces.
    pub(crate) fn complete(&mut self, processed: ProcessedFacet) -> Option<ProcessedFacet> {
        self.status = RecordStatus::Completed;
        self.processed.replace(processed)
    }

    /// Mark the latest attempt as failed; the processed facet is untouched.
    pub(crate) fn fail(&mut self) {
        self.status = RecordStatus::Failed;
    }

    /// Compression ratio of the current processed output, if any.
    pub fn compression_ratio(&self) -> Option<f64> {
        self.processed
            .as_ref()
            .map(|p| compression_ratio(self.original.size, p.size))
    }

    #[cfg(test)]
    pub(crate) fn with_attempt_started_at(mut self, started: DateTime<Utc>) -> Self {
        self.attempt_started_at = Some(started);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// `(1 - processed/original) * 100`, rounded to one decimal place.
///
/// Negative when the output is larger than the original.
pub fn compression_ratio(original_size: u64, processed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio = (1.0 - processed_size as f64 / original_size as f64) * 100.0;
    (ratio * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_original() -> OriginalFacet {
        OriginalFacet {
            filename: "holiday.jpg".to_string(),
            key: StorageKey::new("original.jpg"),
            size: 500_000,
            format: "jpeg".to_string(),
            width: 1920,
            height: 1080,
        }
    }

    fn sample_processed(key: &str, size: u64) -> ProcessedFacet {
        ProcessedFacet {
            key: StorageKey::new(key),
            size,
            format: OutputFormat::Png,
            width: 800,
            height: 450,
        }
    }

    #[test]
    fn test_compression_ratio_rounds_to_one_decimal() {
        assert_eq!(compression_ratio(500_000, 210_000), 58.0);
        assert_eq!(compression_ratio(3, 1), 66.7);
        assert_eq!(compression_ratio(1000, 1500), -50.0);
        assert_eq!(compression_ratio(0, 10), 0.0);
    }

    #[test]
    fn test_new_record_is_uploaded_without_processed_facet() {
        let record = ImageRecord::new(OwnerId::new("alice"), sample_original());
        assert_eq!(record.status(), RecordStatus::Uploaded);
        assert!(record.processed().is_none());
        assert!(record.operations().is_none());
        assert!(record.compression_ratio().is_none());
        assert!(record.is_owned_by(&OwnerId::new("alice")));
        assert!(!record.is_owned_by(&OwnerId::new("bob")));
    }

    #[test]
    fn test_failed_attempt_keeps_last_successful_output() {
        let mut record = ImageRecord::new(OwnerId::new("alice"), sample_original());

        record.begin_attempt(ProcessingOptions::default());
        assert_eq!(record.status(), RecordStatus::Processing);
        assert!(record.complete(sample_processed("first.png", 200_000)).is_none());
        assert_eq!(record.status(), RecordStatus::Completed);

        let retry = ProcessingOptions { rotate: 45, ..Default::default() };
        record.begin_attempt(retry.clone());
        record.fail();

        assert_eq!(record.status(), RecordStatus::Failed);
        assert_eq!(record.operations(), Some(&retry));
        assert_eq!(record.processed().unwrap().key.as_str(), "first.png");
        assert_eq!(record.original(), &sample_original());
    }

    #[test]
    fn test_complete_returns_superseded_facet() {
        let mut record = ImageRecord::new(OwnerId::new("alice"), sample_original());
        record.complete(sample_processed("first.png", 200_000));
        let previous = record.complete(sample_processed("second.png", 100_000)).unwrap();
        assert_eq!(previous.key.as_str(), "first.png");
        assert_eq!(record.compression_ratio(), Some(80.0));
    }

    #[test]
    fn test_record_id_parses_and_rejects_garbage() {
        let id = RecordId::new();
        assert_eq!(id.to_string().parse::<RecordId>().unwrap(), id);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RecordStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_attempt_expiry_only_applies_to_processing() {
        let timeout = std::time::Duration::from_secs(120);
        let now = Utc::now();
        let mut record = ImageRecord::new(OwnerId::new("alice"), sample_original());
        assert!(!record.is_attempt_expired(now, timeout));

        record.begin_attempt(ProcessingOptions::default());
        let started = record.attempt_started_at().unwrap();
        assert!(!record.is_attempt_expired(started + chrono::Duration::seconds(60), timeout));
        assert!(record.is_attempt_expired(started + chrono::Duration::seconds(121), timeout));

        record.fail();
        assert!(!record.is_attempt_expired(started + chrono::Duration::seconds(121), timeout));
    }

    #[test]
    fn test_legacy_processing_record_without_start_is_expired() {
        let mut record = ImageRecord::new(OwnerId::new("alice"), sample_original());
        record.begin_attempt(ProcessingOptions::default());
        let mut value = serde_json::to_value(&record).unwrap();
        value.as_object_mut().unwrap().remove("attempt_started_at");

        let legacy: ImageRecord = serde_json::from_value(value).unwrap();
        assert!(legacy.attempt_started_at().is_none());
        assert!(legacy.is_attempt_expired(Utc::now(), std::time::Duration::from_secs(120)));
    }
}
