//! # Record Store
//!
//! Persistenza dei record di metadati.
//!
//! ## Responsabilità:
//! - CRUD dei record, sempre filtrato per proprietario
//! - `list_recent`: history ordinata per `created_at` decrescente, con skip/limit
//! - `count` / `sum_sizes`: aggregati per lo stats aggregator
//!
//! ## Ownership:
//! Ogni lettura e scrittura è condizionata da `(id, owner)`. Un record di un
//! altro utente è indistinguibile da un record inesistente: `find` restituisce
//! `None`, `update` restituisce `NotFound`.
//!
//! ## Strategia di persistence (`JsonRecordStore`):
//! - `records.json` è l'unica fonte di verità: ogni operazione lo rilegge,
//!   così più processi CLI possono lavorare sullo stesso store
//! - Lock advisory su `records.json.lock` (`fd-lock`): condiviso per le
//!   letture, esclusivo per ogni read-modify-write
//! - Ogni mutazione riscrive il file via file temporaneo + rename; se la
//!   scrittura fallisce il file resta quello precedente

use crate::error::{Result, StudioError};
use crate::record::{ImageRecord, OwnerId, RecordId, RecordStatus};
use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Summed byte sizes over an owner's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeTotals {
    pub original: u64,
    /// Only records with a processed facet contribute
    pub processed: u64,
}

/// Metadata store for image records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: ImageRecord) -> Result<()>;

    /// `None` for missing records and for records of other owners.
    async fn find(&self, id: RecordId, owner: &OwnerId) -> Result<Option<ImageRecord>>;

    /// Replace a stored record as a whole.
    async fn update(&self, record: &ImageRecord) -> Result<()>;

    /// Remove and return the record, if it exists and belongs to `owner`.
    async fn delete(&self, id: RecordId, owner: &OwnerId) -> Result<Option<ImageRecord>>;

    /// Newest first.
    async fn list_recent(&self, owner: &OwnerId, skip: usize, limit: usize) -> Result<Vec<ImageRecord>>;

    async fn count(&self, owner: &OwnerId, status: Option<RecordStatus>) -> Result<u64>;

    async fn sum_sizes(&self, owner: &OwnerId) -> Result<SizeTotals>;

    /// Records in `status` across all owners. Used for maintenance only.
    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<ImageRecord>>;
}

/// On-disk layout of `records.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    records: HashMap<RecordId, ImageRecord>,
}

impl RecordFile {
    fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = sibling(path, ".tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn owned<'a>(&'a self, owner: &'a OwnerId) -> impl Iterator<Item = &'a ImageRecord> + 'a {
        self.records.values().filter(move |r| r.is_owned_by(owner))
    }
}

/// `records.json` + suffix, e.g. `records.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Result of a read-modify-write: the value to return and whether the file
/// must be rewritten.
struct Change<T> {
    value: T,
    dirty: bool,
}

impl<T> Change<T> {
    fn write(value: T) -> Self {
        Self { value, dirty: true }
    }

    fn keep(value: T) -> Self {
        Self { value, dirty: false }
    }
}

/// Record store persisted as a single JSON document shared between processes.
pub struct JsonRecordStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonRecordStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// A file that cannot be parsed is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            lock_path: sibling(&path, ".lock"),
            path,
        };
        let loaded = store.read(|state| state.records.len()).await?;
        debug!("Opened record store {} ({} records)", store.path.display(), loaded);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(lock_path: &Path) -> Result<FileLock<File>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(lock_path)?;
        Ok(FileLock::new(file))
    }

    /// Run `view` on a fresh snapshot, under the shared lock.
    async fn read<T, F>(&self, view: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecordFile) -> T + Send + 'static,
    {
        let (path, lock_path) = (self.path.clone(), self.lock_path.clone());
        tokio::task::spawn_blocking(move || -> Result<T> {
            let lock = Self::lock_file(&lock_path)?;
            let _guard = lock.read()?;
            let state = RecordFile::load(&path)?;
            Ok(view(&state))
        })
        .await?
    }

    /// Reload, apply `change` and persist, all under the exclusive lock.
    async fn modify<T, F>(&self, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RecordFile) -> Result<Change<T>> + Send + 'static,
    {
        let (path, lock_path) = (self.path.clone(), self.lock_path.clone());
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut lock = Self::lock_file(&lock_path)?;
            let _guard = lock.write()?;
            let mut state = RecordFile::load(&path)?;
            let outcome = change(&mut state)?;
            if outcome.dirty {
                state.save(&path)?;
            }
            Ok(outcome.value)
        })
        .await?
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn create(&self, record: ImageRecord) -> Result<()> {
        self.modify(move |state| {
            let id = record.id();
            if state.records.contains_key(&id) {
                return Err(StudioError::Storage(format!("duplicate record id: {}", id)));
            }
            state.records.insert(id, record);
            Ok(Change::write(()))
        })
        .await
    }

    async fn find(&self, id: RecordId, owner: &OwnerId) -> Result<Option<ImageRecord>> {
        let owner = owner.clone();
        self.read(move |state| {
            state
                .records
                .get(&id)
                .filter(|r| r.is_owned_by(&owner))
                .cloned()
        })
        .await
    }

    async fn update(&self, record: &ImageRecord) -> Result<()> {
        let record = record.clone();
        self.modify(move |state| {
            let id = record.id();
            match state.records.get(&id) {
                Some(existing) if existing.is_owned_by(record.owner()) => {}
                // Mai resuscitare un record cancellato altrove
                _ => return Err(StudioError::NotFound),
            }
            state.records.insert(id, record);
            Ok(Change::write(()))
        })
        .await
    }

    async fn delete(&self, id: RecordId, owner: &OwnerId) -> Result<Option<ImageRecord>> {
        let owner = owner.clone();
        self.modify(move |state| {
            if !state.records.get(&id).is_some_and(|r| r.is_owned_by(&owner)) {
                return Ok(Change::keep(None));
            }
            Ok(Change::write(state.records.remove(&id)))
        })
        .await
    }

    async fn list_recent(&self, owner: &OwnerId, skip: usize, limit: usize) -> Result<Vec<ImageRecord>> {
        let owner = owner.clone();
        self.read(move |state| {
            let mut records: Vec<&ImageRecord> = state.owned(&owner).collect();
            // Tie-break on id for a stable order across pages
            records.sort_by(|a, b| {
                b.created_at()
                    .cmp(&a.created_at())
                    .then_with(|| a.id().cmp(&b.id()))
            });
            records.into_iter().skip(skip).take(limit).cloned().collect::<Vec<_>>()
        })
        .await
    }

    async fn count(&self, owner: &OwnerId, status: Option<RecordStatus>) -> Result<u64> {
        let owner = owner.clone();
        self.read(move |state| {
            state
                .owned(&owner)
                .filter(|r| status.map_or(true, |s| r.status() == s))
                .count() as u64
        })
        .await
    }

    async fn sum_sizes(&self, owner: &OwnerId) -> Result<SizeTotals> {
        let owner = owner.clone();
        self.read(move |state| {
            state.owned(&owner).fold(SizeTotals::default(), |mut totals, r| {
                totals.original += r.original().size;
                totals.processed += r.processed().map_or(0, |p| p.size);
                totals
            })
        })
        .await
    }

    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<ImageRecord>> {
        self.read(move |state| {
            state
                .records
                .values()
                .filter(|r| r.status() == status)
                .cloned()
                .collect::<Vec<_>>()
        })
        .await
    }
}
