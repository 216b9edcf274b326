//! # Authentication Module
//!
//! Risolve un bearer token nell'identità del proprietario.
//!
//! ## Strategia:
//! - In configurazione vengono salvati solo i digest SHA-256 (hex) dei token
//! - Il token in chiaro viene mostrato una sola volta, alla creazione
//! - Token vuoto o sconosciuto → `Unauthorized`
//!
//! Il resto della libreria vede solo `OwnerId`, mai la credenziale.

use crate::config::Config;
use crate::error::{Result, StudioError};
use crate::record::OwnerId;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Resolves a bearer credential to an owner.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<OwnerId>;
}

/// Authenticator over a map of token digests.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    digests: BTreeMap<String, OwnerId>,
}

impl TokenAuthenticator {
    pub fn new(digests: BTreeMap<String, OwnerId>) -> Self {
        Self { digests }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tokens.clone())
    }

    /// Hex SHA-256 digest of a token.
    pub fn digest(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Create a new token for `owner` and register its digest in `config`.
    ///
    /// Returns the clear token; it cannot be recovered later.
    pub fn issue_token(config: &mut Config, owner: OwnerId) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        config.tokens.insert(Self::digest(&token), owner);
        token
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<OwnerId> {
        let token = credential.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(StudioError::Unauthorized);
        }

        match self.digests.get(&Self::digest(token)) {
            Some(owner) => {
                debug!("Authenticated owner {}", owner);
                Ok(owner.clone())
            }
            None => Err(StudioError::Unauthorized),
        }
    }
}
