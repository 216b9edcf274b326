//! # Byte Store
//!
//! Storage dei byte grezzi (originali e output elaborati).
//!
//! ## Responsabilità:
//! - `put`: salva i byte e restituisce una chiave opaca `<uuid>.<ext>`
//! - `get`: legge i byte di una chiave
//! - `delete`: idempotente, una chiave mancante non è un errore
//!
//! ## Scrittura atomica:
//! `FsByteStore` scrive in un `NamedTempFile` nella stessa directory e poi
//! fa `persist` (rename atomico): un file parziale non è mai visibile sotto
//! una chiave. I temp file rimasti da un crash vengono rimossi all'apertura,
//! solo se più vecchi di [`STALE_TEMP_AGE`]: quelli recenti possono
//! appartenere a un altro processo che sta ancora scrivendo.

use crate::error::{Result, StudioError};
use crate::record::StorageKey;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Content store for raw image bytes.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Store `bytes` under a fresh key.
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<StorageKey>;

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>>;

    /// Remove a blob. Deleting a missing key succeeds.
    async fn delete(&self, key: &StorageKey) -> Result<()>;
}

/// Minimum age of a temp file before it is treated as a crash leftover.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Byte store backed by a flat directory.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

fn sanitize_extension(extension: &str) -> &str {
    if !extension.is_empty()
        && extension.len() <= 8
        && extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        extension
    } else {
        "bin"
    }
}

impl FsByteStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let store = Self { root };
        let swept = store.sweep_stale_temp_files(STALE_TEMP_AGE);
        if swept > 0 {
            warn!("Removed {} stale temp files from {}", swept, store.root.display());
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are generated by the store; anything that could escape the root is rejected.
    fn path_for(&self, key: &StorageKey) -> Result<PathBuf> {
        let raw = key.as_str();
        if raw.is_empty()
            || raw.starts_with('.')
            || raw.contains('/')
            || raw.contains('\\')
            || raw.contains("..")
        {
            return Err(StudioError::Storage(format!("invalid storage key: {}", raw)));
        }
        Ok(self.root.join(raw))
    }

    /// Remove `.tmp*` leftovers of interrupted writes not touched for `min_age`.
    fn sweep_stale_temp_files(&self, min_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
        {
            let age = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|modified| now.duration_since(modified).ok());
            // Età sconosciuta o nel futuro: il file viene lasciato
            if !age.is_some_and(|age| age >= min_age) {
                debug!("Keeping recent temp file {}", entry.path().display());
                continue;
            }
            if std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

#[async_trait]
impl ByteStore for FsByteStore {
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<StorageKey> {
        let key = StorageKey::new(format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            sanitize_extension(extension)
        ));
        let path = self.path_for(&key)?;
        let root = self.root.clone();
        let size = bytes.len();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await??;

        debug!("Stored {} bytes as {}", size, key);
        Ok(key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StudioError::Storage(format!("missing blob: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Blob {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::open(temp_dir.path()).await.unwrap();

        let key = store.put(b"hello".to_vec(), "png").await.unwrap();
        assert!(key.as_str().ends_with(".png"));
        assert_eq!(store.get(&key).await.unwrap(), b"hello");

        store.delete(&key).await.unwrap();
        assert!(matches!(store.get(&key).await, Err(StudioError::Storage(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::open(temp_dir.path()).await.unwrap();

        let key = store.put(vec![1, 2, 3], "jpg").await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&StorageKey::new("never-existed.jpg")).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_unique_and_leave_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::open(temp_dir.path()).await.unwrap();

        let a = store.put(vec![0; 10], "jpg").await.unwrap();
        let b = store.put(vec![0; 10], "jpg").await.unwrap();
        assert_ne!(a, b);

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with(".tmp")));
    }

    #[tokio::test]
    async fn test_rejects_keys_escaping_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::open(temp_dir.path()).await.unwrap();

        for key in ["../etc/passwd", "a/b.jpg", ".hidden", ""] {
            tokio_test::assert_err!(store.get(&StorageKey::new(key)).await, "key {:?}", key);
        }
    }

    #[tokio::test]
    async fn test_strange_extensions_fall_back_to_bin() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::open(temp_dir.path()).await.unwrap();

        let key = store.put(vec![9], "../../x").await.unwrap();
        assert!(key.as_str().ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_open_sweeps_only_old_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let stale = temp_dir.path().join(".tmpAbC123");
        let in_flight = temp_dir.path().join(".tmpXyZ789");
        std::fs::write(&stale, b"partial").unwrap();
        std::fs::write(&in_flight, b"still writing").unwrap();
        std::fs::write(temp_dir.path().join("keep.jpg"), b"data").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - STALE_TEMP_AGE * 2)
            .unwrap();

        let store = FsByteStore::open(temp_dir.path()).await.unwrap();
        assert!(!stale.exists());
        assert!(in_flight.exists());
        assert_eq!(store.get(&StorageKey::new("keep.jpg")).await.unwrap(), b"data");
    }
}
