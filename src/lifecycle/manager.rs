//! # Record Lifecycle Manager
//!
//! Coordina pipeline, byte store e record store per ogni record.
//!
//! ## Responsabilità:
//! - `begin_upload`: controllo dimensione, verifica del formato, salvataggio
//!   dei byte originali e creazione del record in stato `uploaded`
//! - `run_processing`: esegue la pipeline sui byte originali e registra
//!   l'esito (`completed` con nuovo facet, oppure `failed` con l'errore
//!   restituito al chiamante)
//! - `delete_record`: rimuove record e byte
//! - `read_processed`: legge l'ultimo output elaborato
//! - `recover_interrupted`: chiude come `failed` i tentativi rimasti in
//!   `processing` dopo la morte del processo che li eseguiva
//!
//! ## Concorrenza:
//! - Elaborazione, cancellazione e lettura dell'output dello stesso record
//!   sono serializzate tramite `RecordLocks`
//! - Ogni tentativo gira in un task tokio dedicato: se il chiamante abbandona
//!   la richiesta il tentativo arriva comunque a `completed` o `failed`
//! - La pipeline (CPU-bound) gira in `spawn_blocking` con timeout di
//!   supervisione; allo scadere il record diventa `failed`
//!
//! ## Ordine delle scritture:
//! - Processing: output su byte store → commit metadati → rilascio del
//!   vecchio output. Se il commit fallisce il nuovo output viene cancellato
//! - Delete: prima il record, poi i byte. Un lettore concorrente vede il
//!   record completo oppure `NotFound`

use super::locks::RecordLocks;
use crate::codec::{CodecError, ImageCodec};
use crate::error::{Result, StudioError};
use crate::pipeline::{self, ProcessedImage, ProcessingOptions};
use crate::record::{
    ImageRecord, OriginalFacet, OwnerId, ProcessedFacet, RecordId, RecordStatus, StorageKey,
};
use chrono::Utc;
use crate::store::{ByteStore, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Limits enforced by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerLimits {
    pub max_upload_bytes: u64,
    pub processing_timeout: Duration,
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            processing_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct RecordManager {
    records: Arc<dyn RecordStore>,
    bytes: Arc<dyn ByteStore>,
    codec: Arc<dyn ImageCodec>,
    locks: RecordLocks,
    limits: ManagerLimits,
}

impl RecordManager {
    pub fn new(
        records: Arc<dyn RecordStore>,
        bytes: Arc<dyn ByteStore>,
        codec: Arc<dyn ImageCodec>,
        limits: ManagerLimits,
    ) -> Self {
        Self {
            records,
            bytes,
            codec,
            locks: RecordLocks::new(),
            limits,
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn bytes(&self) -> &Arc<dyn ByteStore> {
        &self.bytes
    }

    pub fn limits(&self) -> ManagerLimits {
        self.limits
    }

    /// Store an upload and create its record in `uploaded` state.
    pub async fn begin_upload(
        &self,
        owner: &OwnerId,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<ImageRecord> {
        let size = bytes.len() as u64;
        if size > self.limits.max_upload_bytes {
            warn!("Rejected upload '{}': {} bytes over limit", filename, size);
            return Err(StudioError::PayloadTooLarge {
                size,
                limit: self.limits.max_upload_bytes,
            });
        }

        let codec = Arc::clone(&self.codec);
        let (bytes, sniffed) = tokio::task::spawn_blocking(move || {
            let sniffed = codec.decode(&bytes);
            (bytes, sniffed)
        })
        .await?;
        let decoded = sniffed.map_err(|e| match e {
            CodecError::UnsupportedFormat(message) => StudioError::UnsupportedFormat(message),
            other => StudioError::UnsupportedFormat(other.to_string()),
        })?;

        let extension = match decoded.format.as_str() {
            "jpeg" => "jpg",
            other => other,
        };
        let key = self.bytes.put(bytes, extension).await?;

        let record = ImageRecord::new(
            owner.clone(),
            OriginalFacet {
                filename: filename.to_string(),
                key: key.clone(),
                size,
                format: decoded.format,
                width: decoded.width,
                height: decoded.height,
            },
        );

        if let Err(e) = self.records.create(record.clone()).await {
            self.release_bytes(&key).await;
            return Err(e);
        }

        info!(
            "📥 Uploaded {} '{}' ({}x{} {}, {} bytes)",
            record.id(),
            filename,
            record.original().width,
            record.original().height,
            record.original().format,
            size
        );
        Ok(record)
    }

    /// Run one processing attempt against the stored original.
    ///
    /// The attempt runs on its own task and always ends in `completed` or
    /// `failed`, even if the returned future is dropped.
    pub async fn run_processing(
        &self,
        id: RecordId,
        owner: &OwnerId,
        options: ProcessingOptions,
    ) -> Result<ImageRecord> {
        let manager = self.clone();
        let owner = owner.clone();
        tokio::spawn(async move { manager.process_attempt(id, &owner, options).await }).await?
    }

    async fn process_attempt(
        &self,
        id: RecordId,
        owner: &OwnerId,
        options: ProcessingOptions,
    ) -> Result<ImageRecord> {
        let _lock = self.locks.acquire(id).await;

        let mut record = self.records.find(id, owner).await?.ok_or(StudioError::NotFound)?;
        record.begin_attempt(options.clone());
        self.records.update(&record).await?;
        info!("⚙️  Processing {} [{}]", id, options.describe());

        match self.finish_attempt(&record, options).await {
            Ok((completed, superseded)) => {
                if let Some(previous) = superseded {
                    self.release_bytes(&previous.key).await;
                }
                info!(
                    "✅ Processed {}: {} -> {} bytes ({}%)",
                    id,
                    completed.original().size,
                    completed.processed().map_or(0, |p| p.size),
                    completed.compression_ratio().unwrap_or(0.0)
                );
                Ok(completed)
            }
            Err(err) => {
                warn!("❌ Processing {} failed: {}", id, err);
                record.fail();
                if let Err(e) = self.records.update(&record).await {
                    error!("Could not mark {} as failed: {}", id, e);
                }
                Err(err)
            }
        }
    }

    /// Pipeline + output write + metadata commit. Returns the committed
    /// record and the processed facet it replaced.
    async fn finish_attempt(
        &self,
        record: &ImageRecord,
        options: ProcessingOptions,
    ) -> Result<(ImageRecord, Option<ProcessedFacet>)> {
        let source = self.bytes.get(&record.original().key).await?;
        let output = self.run_pipeline(source, options).await?;

        let facet_size = output.size;
        let (format, width, height) = (output.format, output.width, output.height);
        let key = self.bytes.put(output.bytes, format.extension()).await?;

        let mut completed = record.clone();
        let superseded = completed.complete(ProcessedFacet {
            key: key.clone(),
            size: facet_size,
            format,
            width,
            height,
        });

        if let Err(e) = self.records.update(&completed).await {
            // Nessun output "orfano" senza record corrispondente
            self.release_bytes(&key).await;
            return Err(e);
        }
        Ok((completed, superseded))
    }

    async fn run_pipeline(&self, source: Vec<u8>, options: ProcessingOptions) -> Result<ProcessedImage> {
        let codec = Arc::clone(&self.codec);
        let timeout = self.limits.processing_timeout;
        let task = tokio::task::spawn_blocking(move || {
            pipeline::process(codec.as_ref(), &source, &options)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?,
            // Il task bloccante termina comunque, il risultato viene scartato
            Err(_) => Err(StudioError::Timeout(timeout)),
        }
    }

    /// Remove a record and both of its blobs.
    pub async fn delete_record(&self, id: RecordId, owner: &OwnerId) -> Result<()> {
        let _lock = self.locks.acquire(id).await;

        let record = self.records.delete(id, owner).await?.ok_or(StudioError::NotFound)?;

        // Entrambi i blob vengono tentati; si riporta il primo errore
        let original = self.bytes.delete(&record.original().key).await;
        let processed = match record.processed() {
            Some(facet) => self.bytes.delete(&facet.key).await,
            None => Ok(()),
        };
        if let Err(e) = &processed {
            warn!("Could not delete processed output of {}: {}", id, e);
        }
        original.and(processed)?;

        info!("🗑️  Deleted {} '{}'", id, record.original().filename);
        Ok(())
    }

    /// Latest processed output of a record, read under the record lock so
    /// a concurrent delete or re-processing cannot remove the bytes midway.
    pub async fn read_processed(&self, id: RecordId, owner: &OwnerId) -> Result<(ProcessedFacet, Vec<u8>)> {
        let _lock = self.locks.acquire(id).await;

        let record = self.records.find(id, owner).await?.ok_or(StudioError::NotFound)?;
        let facet = record.processed().cloned().ok_or(StudioError::NotFound)?;
        let bytes = self.bytes.get(&facet.key).await?;
        Ok((facet, bytes))
    }

    /// Mark `failed` every record whose attempt started more than one
    /// processing timeout ago. Such records belong to a process that died
    /// mid-attempt. Returns how many records were recovered.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let timeout = self.limits.processing_timeout;
        let mut recovered = 0;

        for stale in self.records.list_by_status(RecordStatus::Processing).await? {
            if !stale.is_attempt_expired(Utc::now(), timeout) {
                continue;
            }

            let id = stale.id();
            let _lock = self.locks.acquire(id).await;
            // Riletto sotto lock: l'attempt potrebbe essersi concluso nel frattempo
            let Some(mut record) = self.records.find(id, stale.owner()).await? else {
                continue;
            };
            if record.status() != RecordStatus::Processing || !record.is_attempt_expired(Utc::now(), timeout) {
                continue;
            }

            record.fail();
            match self.records.update(&record).await {
                Ok(()) => {
                    warn!("⏱️  Interrupted attempt on {} marked as failed", id);
                    recovered += 1;
                }
                Err(StudioError::NotFound) => debug!("Record {} deleted during recovery", id),
                Err(e) => return Err(e),
            }
        }

        Ok(recovered)
    }

    /// Best-effort removal of bytes no record points to.
    async fn release_bytes(&self, key: &StorageKey) {
        match self.bytes.delete(key).await {
            Ok(()) => debug!("Released {}", key),
            Err(e) => warn!("Could not release {}: {}", key, e),
        }
    }
}
