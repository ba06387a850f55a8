//! Credential store adapter: read-only principal lookup keyed by username.
//! Owns no logic beyond the lookup itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::principal::Principal;

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<Option<Principal>>;
}

/// Principals loaded once from a JSON array on disk. Stands in for the
/// out-of-scope persistent store at its interface boundary.
pub struct FilePrincipalStore {
    by_username: HashMap<String, Principal>,
}

impl FilePrincipalStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read principals file: {}", path.display()))?;
        let records: Vec<Principal> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse principals file: {}", path.display()))?;
        let mut by_username = HashMap::new();
        for p in records {
            by_username.insert(p.username.clone(), p);
        }
        Ok(Self { by_username })
    }
}

#[async_trait]
impl PrincipalStore for FilePrincipalStore {
    async fn lookup(&self, username: &str) -> Result<Option<Principal>> {
        Ok(self.by_username.get(username).cloned())
    }
}

/// In-memory store for tests and embedding. Counts lookups so tests can
/// assert the store is not consulted again once a token is live.
pub struct StaticPrincipalStore {
    by_username: HashMap<String, Principal>,
    lookups: AtomicUsize,
}

impl StaticPrincipalStore {
    pub fn new(principals: Vec<Principal>) -> Self {
        let mut by_username = HashMap::new();
        for p in principals {
            by_username.insert(p.username.clone(), p);
        }
        Self { by_username, lookups: AtomicUsize::new(0) }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PrincipalStore for StaticPrincipalStore {
    async fn lookup(&self, username: &str) -> Result<Option<Principal>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.by_username.get(username).cloned())
    }
}
