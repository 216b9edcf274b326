//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del servizio
//! - Fornisce validazione dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `storage_dir`: Directory di record e byte (default: `~/.image-studio`)
//! - `max_upload_bytes`: Limite dimensione upload (default: 10 MiB)
//! - `processing_timeout_secs`: Timeout di supervisione dell'elaborazione (default: 120)
//! - `default_page_size`: Elementi per pagina della history (default: 10)
//! - `tokens`: Digest SHA-256 dei bearer token → proprietario
//!
//! ## Layout di `storage_dir`:
//! ```text
//! ~/.image-studio/
//! ├── config.json
//! ├── records.json
//! └── blobs/
//!     ├── 3b2e....jpg
//!     └── 9a41....png
//! ```

use crate::lifecycle::ManagerLimits;
use crate::record::OwnerId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = ".image-studio";

/// Configuration for the image studio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for record metadata and image bytes
    pub storage_dir: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
    /// Processing attempts running longer are marked failed
    pub processing_timeout_secs: u64,
    /// History page size when none is requested
    pub default_page_size: usize,
    /// SHA-256 hex digest of each bearer token and the owner it maps to
    pub tokens: BTreeMap<String, OwnerId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_upload_bytes: 10 * 1024 * 1024,
            processing_timeout_secs: 120,
            default_page_size: 10,
            tokens: BTreeMap::new(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        default_storage_dir().join("config.json")
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Upload limit must be greater than 0"));
        }

        if self.processing_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Processing timeout must be greater than 0"));
        }

        if self.default_page_size == 0 {
            return Err(anyhow::anyhow!("Default page size must be greater than 0"));
        }

        if self.storage_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Storage directory must not be empty"));
        }

        if let Some(digest) = self
            .tokens
            .keys()
            .find(|d| d.len() != 64 || !d.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(anyhow::anyhow!("Invalid token digest: {}", digest));
        }

        Ok(())
    }

    pub fn records_path(&self) -> PathBuf {
        self.storage_dir.join("records.json")
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.storage_dir.join("blobs")
    }

    pub fn limits(&self) -> ManagerLimits {
        ManagerLimits {
            max_upload_bytes: self.max_upload_bytes,
            processing_timeout: Duration::from_secs(self.processing_timeout_secs),
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        config.max_upload_bytes = 1024;
        config.processing_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.processing_timeout_secs = 5;
        config.default_page_size = 0;
        assert!(config.validate().is_err());

        config.default_page_size = 10;
        config.tokens.insert("not-a-digest".to_string(), OwnerId::new("alice"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.processing_timeout_secs, 120);
        assert_eq!(config.default_page_size, 10);
        assert!(config.tokens.is_empty());
        assert!(config.storage_dir.ends_with(".image-studio"));
        assert_eq!(config.limits(), ManagerLimits::default());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut original_config = Config {
            storage_dir: temp_dir.path().join("data"),
            max_upload_bytes: 2048,
            processing_timeout_secs: 30,
            default_page_size: 25,
            tokens: BTreeMap::new(),
        };
        original_config.tokens.insert("ab".repeat(32), OwnerId::new("alice"));

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
        assert_eq!(loaded_config.records_path(), temp_dir.path().join("data").join("records.json"));
        assert_eq!(loaded_config.limits().processing_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_missing_file_and_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(missing, Config::default());

        let partial_path = temp_dir.path().join("partial.json");
        tokio::fs::write(&partial_path, r#"{"default_page_size": 3}"#).await.unwrap();
        let partial = Config::from_file(&partial_path).await.unwrap();
        assert_eq!(partial.default_page_size, 3);
        assert_eq!(partial.max_upload_bytes, 10 * 1024 * 1024);
    }
}
