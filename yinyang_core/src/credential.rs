//! The single bearer credential used for outbound requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::persistence::Persistence;

pub const DEFAULT_PREFIX: &str = "sk-";
pub const DEFAULT_MIN_LENGTH: usize = 30;

/// Keys that were shipped or leaked at some point and must never validate.
pub const REVOKED_SENTINELS: &[&str] = &["sk-ce242eb3749d4b9c88f6416b008d6836"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("invalid credential format: {0}")]
    InvalidFormat(&'static str),
}

/// A bearer token that passed format validation. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short form safe for logs and status lines, e.g. `sk-abc…wxyz`.
    #[must_use]
    pub fn masked(&self) -> String {
        let head: String = self.0.chars().take(6).collect();
        let tail: String = {
            let chars: Vec<char> = self.0.chars().collect();
            chars[chars.len().saturating_sub(4)..].iter().collect()
        };
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

/// Format rules a credential must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPolicy {
    #[serde(default = "CredentialPolicy::default_prefix")]
    pub prefix: String,
    /// The credential must be strictly longer than this many characters.
    #[serde(default = "CredentialPolicy::default_min_length")]
    pub min_length: usize,
    /// Extra revoked values on top of [`REVOKED_SENTINELS`].
    #[serde(default)]
    pub revoked: Vec<String>,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            min_length: Self::default_min_length(),
            revoked: Vec::new(),
        }
    }
}

impl CredentialPolicy {
    fn default_prefix() -> String {
        DEFAULT_PREFIX.to_string()
    }

    const fn default_min_length() -> usize {
        DEFAULT_MIN_LENGTH
    }

    fn is_revoked(&self, candidate: &str) -> bool {
        REVOKED_SENTINELS.contains(&candidate) || self.revoked.iter().any(|r| r == candidate)
    }

    /// Trim and check `candidate`, returning the validated credential.
    pub fn validate(&self, candidate: &str) -> Result<Credential, CredentialError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(CredentialError::InvalidFormat("credential is empty"));
        }
        if !candidate.starts_with(&self.prefix) {
            return Err(CredentialError::InvalidFormat("missing required prefix"));
        }
        if candidate.chars().count() <= self.min_length {
            return Err(CredentialError::InvalidFormat("credential is too short"));
        }
        if self.is_revoked(candidate) {
            return Err(CredentialError::InvalidFormat("credential has been revoked"));
        }
        Ok(Credential(candidate.to_string()))
    }
}

/// Holds the current credential and keeps the persisted copy in sync.
#[derive(Debug)]
pub struct CredentialStore {
    policy: CredentialPolicy,
    persistence: Persistence,
    key: String,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(policy: CredentialPolicy, persistence: Persistence, key: impl Into<String>) -> Self {
        Self {
            policy,
            persistence,
            key: key.into(),
            current: RwLock::new(None),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Check a candidate without storing it.
    pub fn validate(&self, candidate: &str) -> Result<Credential, CredentialError> {
        self.policy.validate(candidate)
    }

    /// Restore the persisted credential.
    ///
    /// A persisted value that no longer passes validation (a revoked sentinel,
    /// or a key written under older rules) is dropped and its stored copy
    /// removed.
    pub async fn load(&self) -> Option<Credential> {
        let stored: Option<String> = self.persistence.load_optional(&self.key).await;
        let loaded = match stored {
            Some(raw) => match self.policy.validate(&raw) {
                Ok(credential) => {
                    info!("Loaded stored credential {}", credential.masked());
                    Some(credential)
                }
                Err(e) => {
                    warn!("Discarding stored credential: {e}");
                    self.persistence.clear(&self.key).await;
                    None
                }
            },
            None => None,
        };
        self.replace(loaded.clone());
        loaded
    }

    /// Validate and store a new credential, replacing any previous one.
    pub async fn set(&self, candidate: &str) -> Result<Credential, CredentialError> {
        let credential = self.policy.validate(candidate)?;
        self.replace(Some(credential.clone()));

        if !self
            .persistence
            .save(&self.key, &credential.expose())
            .await
        {
            warn!("Credential kept in memory only; it will not survive a restart");
        }
        info!("Stored credential {}", credential.masked());
        Ok(credential)
    }

    /// The held credential, if it still validates.
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|c| self.policy.validate(c.expose()).is_ok())
            .cloned()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current().is_some()
    }

    /// Forget the credential in memory and in storage.
    pub async fn invalidate(&self) {
        if let Some(old) = self.take() {
            info!("Invalidated credential {}", old.masked());
        }
        self.persistence.clear(&self.key).await;
    }

    fn replace(&self, credential: Option<Credential>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credential;
    }

    fn take(&self) -> Option<Credential> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    const KEY: &str = "api_key";

    fn good_key() -> String {
        format!("sk-{}", "x".repeat(40))
    }

    fn store_with(backend: Arc<MemoryStore>) -> CredentialStore {
        CredentialStore::new(
            CredentialPolicy::default(),
            Persistence::new(backend),
            KEY,
        )
    }

    #[test]
    fn format_rules() {
        let policy = CredentialPolicy::default();

        assert!(policy.validate(&good_key()).is_ok());
        assert!(policy.validate("sk-short").is_err());
        assert!(policy.validate("").is_err());
        assert!(policy.validate(&format!("pk-{}", "x".repeat(40))).is_err());
        assert!(policy.validate(REVOKED_SENTINELS[0]).is_err());
        // Exactly the threshold is not enough.
        assert!(policy.validate(&format!("sk-{}", "x".repeat(27))).is_err());
        assert!(policy.validate(&format!("sk-{}", "x".repeat(28))).is_ok());
    }

    #[test]
    fn debug_is_redacted() {
        let credential = CredentialPolicy::default()
            .validate(&format!("sk-abc{}wxyz", "0".repeat(30)))
            .ok();
        let printed = format!("{credential:?}");

        assert!(printed.contains("sk-abc…wxyz"));
        assert!(!printed.contains("000000"));
    }

    #[tokio::test]
    async fn set_rejects_bad_input_and_keeps_current() {
        let store = store_with(Arc::new(MemoryStore::new()));
        let first = store.set(&good_key()).await.ok();

        let err = store.set("sk-short").await;

        assert!(matches!(err, Err(CredentialError::InvalidFormat(_))));
        assert_eq!(store.current(), first);
        assert!(store.is_valid());
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn set_persists_and_load_restores() {
        let backend = Arc::new(MemoryStore::new());
        store_with(backend.clone())
            .set(&format!("  {}  ", good_key()))
            .await
            .expect("valid key");

        let reopened = store_with(backend);
        let loaded = reopened.load().await.expect("persisted key");

        assert_eq!(loaded.expose(), good_key());
        assert!(reopened.is_valid());
    }

    #[tokio::test]
    async fn revoked_sentinel_is_migrated_away_on_load() {
        let backend = Arc::new(MemoryStore::new());
        let raw = serde_json::to_string(REVOKED_SENTINELS[0]).unwrap_or_default();
        let _ = backend.put(KEY, raw).await;

        let store = store_with(backend.clone());

        assert!(store.load().await.is_none());
        assert!(!store.is_valid());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn invalidate_clears_memory_and_storage() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone());
        let _ = store.set(&good_key()).await;

        store.invalidate().await;

        assert!(store.current().is_none());
        assert!(backend.is_empty().await);
    }
}
