//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico della CLI.
//!
//! ## Responsabilità:
//! - Un messaggio JSON per comando, su una riga di stdout
//! - Riusa i summary del service senza duplicarne i campi
//! - Errori con categoria stabile (`kind`) per i chiamanti
//!
//! ## Tipi di messaggi:
//! - `upload`: Record creato
//! - `process`: Esito dell'elaborazione
//! - `history`: Pagina della history con paginazione
//! - `delete`: Record rimosso
//! - `stats`: Statistiche aggregate
//! - `export`: Output elaborato salvato su file
//! - `token`: Nuovo token emesso
//! - `error`: Errore durante il comando

use crate::codec::OutputFormat;
use crate::error::StudioError;
use crate::record::{OwnerId, RecordId};
use crate::service::{HistoryPage, ProcessSummary, UploadSummary};
use crate::stats::UserStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "upload")]
    Upload(UploadSummary),

    #[serde(rename = "process")]
    Process(ProcessSummary),

    #[serde(rename = "history")]
    History(HistoryPage),

    #[serde(rename = "delete")]
    Delete { id: RecordId },

    #[serde(rename = "stats")]
    Stats(UserStats),

    #[serde(rename = "export")]
    Export {
        id: RecordId,
        path: PathBuf,
        format: OutputFormat,
        size: u64,
    },

    /// Il token in chiaro compare solo qui
    #[serde(rename = "token")]
    Token { owner: OwnerId, token: String },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        kind: String,
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = self.to_json() {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di errore
    pub fn error(kind: &str, message: String, details: Option<String>) -> Self {
        Self::Error {
            kind: kind.to_string(),
            message,
            details,
        }
    }

    /// Messaggio di errore da un errore della CLI; la categoria viene dal
    /// `StudioError` sottostante, se presente.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let kind = err
            .downcast_ref::<StudioError>()
            .map_or("internal", StudioError::kind);
        let details = err.chain().nth(1).map(|cause| cause.to_string());
        Self::error(kind, err.to_string(), details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_messages_are_tagged() {
        let id = RecordId::new();
        let json = JsonMessage::Delete { id }.to_json().unwrap();
        assert_eq!(json, format!(r#"{{"type":"delete","id":"{}"}}"#, id));

        let stats = JsonMessage::Stats(UserStats::new(2, 1, 1, 100, 150)).to_json().unwrap();
        assert!(stats.starts_with(r#"{"type":"stats","total_images":2"#));
        assert!(stats.contains(r#""total_saved":0"#));
    }

    #[test]
    fn test_upload_summary_is_flattened() {
        let summary = UploadSummary {
            id: RecordId::new(),
            filename: "a.png".to_string(),
            format: "png".to_string(),
            width: 3,
            height: 2,
            size: 42,
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonMessage::Upload(summary).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "upload");
        assert_eq!(value["width"], 3);
        assert_eq!(value["filename"], "a.png");
    }

    #[test]
    fn test_error_kind_from_studio_error() {
        let err = anyhow::Error::new(StudioError::NotFound);
        match JsonMessage::from_error(&err) {
            JsonMessage::Error { kind, message, details } => {
                assert_eq!(kind, "not_found");
                assert_eq!(message, "Image not found");
                assert!(details.is_none());
            }
            other => panic!("unexpected message {:?}", other),
        }

        let wrapped: anyhow::Result<()> = Err(std::io::Error::new(std::io::ErrorKind::Other, "disk"))
            .context("Could not read input");
        let err = wrapped.unwrap_err();
        match JsonMessage::from_error(&err) {
            JsonMessage::Error { kind, details, .. } => {
                assert_eq!(kind, "internal");
                assert_eq!(details.as_deref(), Some("disk"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
