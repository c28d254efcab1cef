//! # In-Memory Credential Store
//!
//! Thread-safe in-memory credential store for a single node, used by the
//! service for credentials loaded from configuration and by tests.

use crate::credentials::{Credential, CredentialError, CredentialKind, CredentialStore};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Thread-safe in-memory credential store
///
/// Holds at most one credential per kind. Uses RwLock since reads dominate.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<CredentialKind, Credential>>>,
}

impl InMemoryCredentialStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-populated with credentials
    ///
    /// A later credential of the same kind replaces an earlier one.
    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let map = credentials
            .into_iter()
            .map(|credential| (credential.kind(), credential))
            .collect();

        Self {
            credentials: Arc::new(RwLock::new(map)),
        }
    }

    /// Add or replace the credential of the given credential's kind
    pub fn insert(&self, credential: Credential) -> Result<(), CredentialError> {
        let mut credentials = self.credentials.write().map_err(|_| lock_poisoned())?;
        credentials.insert(credential.kind(), credential);
        Ok(())
    }

    /// Remove the credential of the given kind
    pub fn remove(&self, kind: CredentialKind) -> Result<Option<Credential>, CredentialError> {
        let mut credentials = self.credentials.write().map_err(|_| lock_poisoned())?;
        Ok(credentials.remove(&kind))
    }

    /// Number of stored credentials
    pub fn len(&self) -> usize {
        self.credentials.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCredentialStore")
            .field("credentials", &self.len())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credential(
        &self,
        kind: CredentialKind,
    ) -> Result<Option<Credential>, CredentialError> {
        let credentials = self.credentials.read().map_err(|_| lock_poisoned())?;
        Ok(credentials.get(&kind).cloned())
    }
}

fn lock_poisoned() -> CredentialError {
    CredentialError::Unavailable {
        message: "credential store lock poisoned".to_string(),
    }
}

#[cfg(test)]
#[path = "memory_credentials_tests.rs"]
mod tests;
