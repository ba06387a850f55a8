//! Token sessions: the cached authorization context and the cache boundary.
//!
//! The cache is the sole source of truth for "is this token currently valid".
//! A cache failure is surfaced as an error so callers fail closed; a token is
//! never served past its context's expiry.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::principal::{Principal, Role};

/// Resolved authorization context cached under an opaque bearer token.
/// Derived from a verified principal; never persisted beyond the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub role: Role,
    pub workspaces: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn issue(principal: &Principal, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            username: principal.username.clone(),
            role: principal.role,
            workspaces: principal.workspaces.iter().cloned().collect(),
            issued_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn in_scope(&self, workspace: &str) -> bool {
        self.workspaces.contains(workspace)
    }

    /// The sole workspace in scope, when scope is unambiguous.
    pub fn single_workspace(&self) -> Option<&str> {
        if self.workspaces.len() == 1 {
            self.workspaces.iter().next().map(|s| s.as_str())
        } else {
            None
        }
    }
}

pub fn mint_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Returns the live context for the token, or None on miss/expiry.
    /// Err means the cache layer itself is unavailable (callers fail closed).
    async fn get(&self, token: &str) -> Result<Option<AuthContext>>;
    async fn put(&self, token: &str, ctx: AuthContext) -> Result<()>;
    async fn invalidate(&self, token: &str) -> Result<()>;
}

/// In-process cache with native TTL eviction.
pub struct MokaTokenCache {
    cache: moka::sync::Cache<String, AuthContext>,
}

impl MokaTokenCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            cache: moka::sync::Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl TokenCache for MokaTokenCache {
    async fn get(&self, token: &str) -> Result<Option<AuthContext>> {
        match self.cache.get(token) {
            // expires_at is checked on read as well, in case eviction lags
            Some(ctx) if !ctx.is_expired() => Ok(Some(ctx)),
            Some(_) => {
                self.cache.invalidate(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, token: &str, ctx: AuthContext) -> Result<()> {
        self.cache.insert(token.to_string(), ctx);
        Ok(())
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        self.cache.invalidate(token);
        Ok(())
    }
}
