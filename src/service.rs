//! # Image Service
//!
//! Operazioni esposte verso l'esterno, indipendenti dal trasporto.
//!
//! ## Operazioni:
//! - **Upload**: byte + filename + owner → `UploadSummary`
//! - **Process**: id + owner + opzioni → `ProcessSummary`
//! - **History**: owner + pagina → `HistoryPage` (dal più recente)
//! - **Delete**: id + owner → `()`
//! - **Stats**: owner → `UserStats`
//! - **Export**: id + owner → byte dell'ultimo output elaborato
//!
//! L'autenticazione avviene prima: ogni operazione riceve già l'`OwnerId`.
//! Un id malformato viene trattato come `NotFound`, come un record
//! inesistente o di un altro utente.

use crate::auth::{Authenticator, TokenAuthenticator};
use crate::codec::{OutputFormat, RasterCodec};
use crate::config::Config;
use crate::error::{Result, StudioError};
use crate::lifecycle::RecordManager;
use crate::pipeline::ProcessingOptions;
use crate::record::{ImageRecord, OwnerId, ProcessedFacet, RecordId, RecordStatus, StorageKey};
use crate::stats::{self, UserStats};
use crate::store::{FsByteStore, JsonRecordStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Parse a record id; malformed ids are indistinguishable from missing records.
pub fn parse_record_id(raw: &str) -> Result<RecordId> {
    raw.parse().map_err(|_| StudioError::NotFound)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub id: RecordId,
    pub filename: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

impl From<&ImageRecord> for UploadSummary {
    fn from(record: &ImageRecord) -> Self {
        let original = record.original();
        Self {
            id: record.id(),
            filename: original.filename.clone(),
            format: original.format.clone(),
            width: original.width,
            height: original.height,
            size: original.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: RecordId,
    pub original_key: StorageKey,
    pub processed_key: StorageKey,
    pub original_size: u64,
    pub processed_size: u64,
    pub compression_ratio: f64,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl ProcessSummary {
    fn from_record(record: &ImageRecord) -> Result<Self> {
        let processed = record.processed().ok_or_else(|| {
            StudioError::Storage(format!("record {} completed without output", record.id()))
        })?;
        Ok(Self {
            id: record.id(),
            original_key: record.original().key.clone(),
            processed_key: processed.key.clone(),
            original_size: record.original().size,
            processed_size: processed.size,
            compression_ratio: record.compression_ratio().unwrap_or(0.0),
            format: processed.format,
            width: processed.width,
            height: processed.height,
        })
    }
}

/// Full view of one record, as listed by history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: RecordId,
    pub original_name: String,
    pub original_key: StorageKey,
    pub original_size: u64,
    pub original_format: String,
    pub width: u32,
    pub height: u32,
    pub processed: Option<ProcessedFacet>,
    pub compression_ratio: Option<f64>,
    pub operations: Option<ProcessingOptions>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&ImageRecord> for HistoryEntry {
    fn from(record: &ImageRecord) -> Self {
        let original = record.original();
        Self {
            id: record.id(),
            original_name: original.filename.clone(),
            original_key: original.key.clone(),
            original_size: original.size,
            original_format: original.format.clone(),
            width: original.width,
            height: original.height,
            processed: record.processed().cloned(),
            compression_ratio: record.compression_ratio(),
            operations: record.operations().cloned(),
            status: record.status(),
            created_at: record.created_at(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: u64,
    /// `ceil(total / limit)`
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let per_page = limit as u64;
        Self {
            page,
            limit,
            total,
            pages: (total + per_page - 1) / per_page,
        }
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub pagination: Pagination,
}

/// Entry point for every user-facing operation.
#[derive(Clone)]
pub struct ImageService {
    auth: Arc<dyn Authenticator>,
    manager: RecordManager,
    default_page_size: usize,
}

impl ImageService {
    pub fn new(auth: Arc<dyn Authenticator>, manager: RecordManager, default_page_size: usize) -> Self {
        Self {
            auth,
            manager,
            default_page_size: default_page_size.max(1),
        }
    }

    /// Build the service on the file-system stores described by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let records = JsonRecordStore::open(config.records_path()).await?;
        let bytes = FsByteStore::open(config.blobs_dir()).await?;
        let manager = RecordManager::new(
            Arc::new(records),
            Arc::new(bytes),
            Arc::new(RasterCodec::new()),
            config.limits(),
        );
        debug!("Opened storage at {}", config.storage_dir.display());

        let recovered = manager.recover_interrupted().await?;
        if recovered > 0 {
            info!("Marked {} interrupted attempts as failed", recovered);
        }

        Ok(Self::new(
            Arc::new(TokenAuthenticator::from_config(config)),
            manager,
            config.default_page_size,
        ))
    }

    pub async fn authenticate(&self, credential: &str) -> Result<OwnerId> {
        self.auth.authenticate(credential).await
    }

    pub async fn upload(&self, owner: &OwnerId, filename: &str, bytes: Vec<u8>) -> Result<UploadSummary> {
        let record = self.manager.begin_upload(owner, bytes, filename).await?;
        Ok(UploadSummary::from(&record))
    }

    pub async fn process(
        &self,
        id: RecordId,
        owner: &OwnerId,
        options: ProcessingOptions,
    ) -> Result<ProcessSummary> {
        let record = self.manager.run_processing(id, owner, options).await?;
        ProcessSummary::from_record(&record)
    }

    /// One page of the owner's records, newest first.
    ///
    /// `page` below 1 is treated as 1; a zero `limit` uses the configured page size.
    pub async fn history(&self, owner: &OwnerId, page: usize, limit: usize) -> Result<HistoryPage> {
        let limit = if limit == 0 { self.default_page_size } else { limit };
        let pagination = Pagination::new(page, limit, 0);

        let records = self.manager.records();
        let (found, total) = futures::try_join!(
            records.list_recent(owner, pagination.skip(), pagination.limit),
            records.count(owner, None),
        )?;

        Ok(HistoryPage {
            entries: found.iter().map(HistoryEntry::from).collect(),
            pagination: Pagination::new(pagination.page, pagination.limit, total),
        })
    }

    pub async fn delete(&self, id: RecordId, owner: &OwnerId) -> Result<()> {
        self.manager.delete_record(id, owner).await
    }

    pub async fn stats(&self, owner: &OwnerId) -> Result<UserStats> {
        stats::compute_stats(self.manager.records().as_ref(), owner).await
    }

    /// Bytes of the latest processed output.
    ///
    /// `NotFound` also when the record was never processed successfully.
    pub async fn processed_bytes(&self, id: RecordId, owner: &OwnerId) -> Result<(ProcessedFacet, Vec<u8>)> {
        let (facet, bytes) = self.manager.read_processed(id, owner).await?;
        info!("📤 Exported {} ({} bytes)", id, bytes.len());
        Ok((facet, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ImageCodec, Quality};
    use crate::pipeline::{Filter, ResizeTarget};
    use crate::record::compression_ratio;
    use crate::test_support::{encode_jpeg, encode_png, gradient_rgb};
    use tempfile::TempDir;

    struct Harness {
        _temp_dir: TempDir,
        config: Config,
        service: ImageService,
        token: String,
    }

    async fn harness() -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config {
            storage_dir: temp_dir.path().join("studio"),
            ..Default::default()
        };
        let token = TokenAuthenticator::issue_token(&mut config, OwnerId::new("alice"));
        let service = ImageService::open(&config).await.unwrap();
        Harness { _temp_dir: temp_dir, config, service, token }
    }

    fn alice() -> OwnerId {
        OwnerId::new("alice")
    }

    #[tokio::test]
    async fn test_authenticate_with_issued_token() {
        let h = harness().await;
        assert_eq!(h.service.authenticate(&h.token).await.unwrap(), alice());
        assert!(matches!(
            h.service.authenticate("wrong").await,
            Err(StudioError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_upload_then_resize_to_png() {
        let h = harness().await;
        let source = encode_jpeg(&gradient_rgb(1920, 1080));
        let source_size = source.len() as u64;

        let upload = h.service.upload(&alice(), "landscape.jpg", source).await.unwrap();
        assert_eq!((upload.width, upload.height), (1920, 1080));
        assert_eq!(upload.format, "jpeg");
        assert_eq!(upload.size, source_size);

        let options = ProcessingOptions {
            resize: Some(ResizeTarget { width: Some(800), height: None }),
            format: OutputFormat::Png,
            quality: Quality::new(90),
            ..Default::default()
        };
        let summary = h.service.process(upload.id, &alice(), options).await.unwrap();

        assert_eq!((summary.width, summary.height), (800, 450));
        assert_eq!(summary.format, OutputFormat::Png);
        assert_eq!(summary.original_size, source_size);
        assert_eq!(
            summary.compression_ratio,
            compression_ratio(source_size, summary.processed_size)
        );

        let (facet, bytes) = h.service.processed_bytes(upload.id, &alice()).await.unwrap();
        assert_eq!(facet.key, summary.processed_key);
        assert_eq!(bytes.len() as u64, summary.processed_size);
        let decoded = RasterCodec::new().decode(&bytes).unwrap();
        assert_eq!((decoded.format.as_str(), decoded.width, decoded.height), ("png", 800, 450));
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let h = harness().await;
        let image = encode_png(&gradient_rgb(4, 4));
        for i in 0..15 {
            h.service
                .upload(&alice(), &format!("img-{}.png", i), image.clone())
                .await
                .unwrap();
        }
        h.service.upload(&OwnerId::new("bob"), "other.png", image.clone()).await.unwrap();

        let page = h.service.history(&alice(), 2, 10).await.unwrap();
        assert_eq!(page.entries.len(), 5);
        assert_eq!(
            page.pagination,
            Pagination { page: 2, limit: 10, total: 15, pages: 2 }
        );

        let first = h.service.history(&alice(), 0, 0).await.unwrap();
        assert_eq!(first.pagination.page, 1);
        assert_eq!(first.pagination.limit, h.config.default_page_size);
        assert_eq!(first.entries.len(), 10);
        assert!(first
            .entries
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));

        let beyond = h.service.history(&alice(), 5, 10).await.unwrap();
        assert!(beyond.entries.is_empty());
        assert_eq!(beyond.pagination.total, 15);
    }

    #[tokio::test]
    async fn test_history_entry_carries_snapshot_and_status() {
        let h = harness().await;
        let upload = h
            .service
            .upload(&alice(), "a.png", encode_png(&gradient_rgb(16, 16)))
            .await
            .unwrap();
        let options = ProcessingOptions {
            filters: vec![Filter::Sepia, Filter::parse("vintage")],
            ..Default::default()
        };
        h.service.process(upload.id, &alice(), options.clone()).await.unwrap();

        let page = h.service.history(&alice(), 1, 10).await.unwrap();
        let entry = &page.entries[0];
        assert_eq!(entry.original_name, "a.png");
        assert_eq!(entry.status, RecordStatus::Completed);
        assert_eq!(entry.operations.as_ref(), Some(&options));
        assert_eq!(entry.processed.as_ref().unwrap().format, OutputFormat::Jpeg);
        assert!(entry.compression_ratio.is_some());
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_looks_like_missing_id() {
        let h = harness().await;
        let upload = h
            .service
            .upload(&alice(), "a.png", encode_png(&gradient_rgb(8, 8)))
            .await
            .unwrap();
        let mallory = OwnerId::new("mallory");

        let foreign = h.service.delete(upload.id, &mallory).await.unwrap_err();
        let missing = h.service.delete(RecordId::new(), &mallory).await.unwrap_err();
        assert!(matches!(foreign, StudioError::NotFound));
        assert!(matches!(missing, StudioError::NotFound));
        assert_eq!(foreign.to_string(), missing.to_string());

        h.service.delete(upload.id, &alice()).await.unwrap();
        assert!(matches!(
            h.service.delete(upload.id, &alice()).await,
            Err(StudioError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_open_fails_attempts_left_by_dead_process() {
        let h = harness().await;
        let upload = h
            .service
            .upload(&alice(), "a.png", encode_png(&gradient_rgb(8, 8)))
            .await
            .unwrap();

        // Stato lasciato da un processo terminato a metà elaborazione
        let records = h.service.manager.records();
        let mut record = records.find(upload.id, &alice()).await.unwrap().unwrap();
        record.begin_attempt(ProcessingOptions::default());
        let record = record.with_attempt_started_at(chrono::Utc::now() - chrono::Duration::hours(1));
        records.update(&record).await.unwrap();

        let reopened = ImageService::open(&h.config).await.unwrap();
        let page = reopened.history(&alice(), 1, 10).await.unwrap();
        assert_eq!(page.entries[0].status, RecordStatus::Failed);
        assert_eq!(reopened.stats(&alice()).await.unwrap().failed_images, 1);
    }

    #[tokio::test]
    async fn test_export_before_processing_is_not_found() {
        let h = harness().await;
        let upload = h
            .service
            .upload(&alice(), "a.png", encode_png(&gradient_rgb(8, 8)))
            .await
            .unwrap();
        assert!(matches!(
            h.service.processed_bytes(upload.id, &alice()).await,
            Err(StudioError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_stats_reflect_outcomes() {
        let h = harness().await;
        let image = encode_png(&gradient_rgb(32, 32));
        let ok = h.service.upload(&alice(), "ok.png", image.clone()).await.unwrap();
        let bad = h.service.upload(&alice(), "bad.png", image.clone()).await.unwrap();
        h.service.upload(&alice(), "idle.png", image.clone()).await.unwrap();

        let done = h.service.process(ok.id, &alice(), ProcessingOptions::default()).await.unwrap();
        let zero = ProcessingOptions {
            resize: Some(ResizeTarget { width: Some(0), height: Some(0) }),
            ..Default::default()
        };
        assert!(h.service.process(bad.id, &alice(), zero).await.is_err());

        let stats = h.service.stats(&alice()).await.unwrap();
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.completed_images, 1);
        assert_eq!(stats.failed_images, 1);
        assert_eq!(stats.total_original_bytes, 3 * image.len() as u64);
        assert_eq!(stats.total_processed_bytes, done.processed_size);

        assert_eq!(h.service.stats(&OwnerId::new("bob")).await.unwrap(), UserStats::default());
    }

    #[test]
    fn test_malformed_id_is_not_found() {
        assert!(matches!(parse_record_id("12"), Err(StudioError::NotFound)));
        let id = RecordId::new();
        assert_eq!(parse_record_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_pagination_math() {
        assert_eq!(Pagination::new(2, 10, 15).pages, 2);
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).pages, 2);
        assert_eq!(Pagination::new(0, 10, 11).skip(), 0);
        assert_eq!(Pagination::new(3, 7, 50).skip(), 14);
    }
}
