//! The authenticator turns presented credentials into an authorization
//! context, or a rejection. Login and token presentation share one entry
//! point over the `Credential` sum type.
//!
//! Failure variants are distinguished internally for logging, but every one
//! of them maps to the same external Unauthenticated response.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::secret::{burn_verification, verify_password};
use super::session::{mint_token, AuthContext, TokenCache};
use super::store::PrincipalStore;

/// Credentials presented by a client: either an initial login or a bearer
/// token issued by a previous login.
#[derive(Debug, Clone)]
pub enum Credential {
    Secret { username: String, secret: String },
    Bearer { token: String },
}

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("unknown principal")]
    UnknownPrincipal,
    #[error("inactive principal")]
    InactivePrincipal,
    #[error("secret mismatch")]
    BadSecret,
    #[error("expired or unknown token")]
    ExpiredOrUnknownToken,
    #[error("session cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuthFailure {
    /// True when the failure is an infrastructure fault rather than a
    /// credential problem. Both classes deny access; this only steers logging.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthFailure::CacheUnavailable(_) | AuthFailure::StoreUnavailable(_))
    }
}

/// A successful authentication. `fresh_token` is set only on the login path
/// and is signaled back to the client once.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub context: AuthContext,
    pub fresh_token: Option<String>,
}

pub struct Authenticator {
    store: Arc<dyn PrincipalStore>,
    cache: Arc<dyn TokenCache>,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<dyn PrincipalStore>, cache: Arc<dyn TokenCache>, token_ttl: Duration) -> Self {
        Self { store, cache, token_ttl }
    }

    pub async fn authenticate(&self, credential: Credential) -> Result<Authenticated, AuthFailure> {
        match credential {
            Credential::Bearer { token } => self.authenticate_token(&token).await,
            Credential::Secret { username, secret } => self.login(&username, &secret).await,
        }
    }

    /// Invalidate a live token. Invalidating an unknown token is not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AuthFailure> {
        self.cache
            .invalidate(token)
            .await
            .map_err(|e| AuthFailure::CacheUnavailable(e.to_string()))
    }

    async fn authenticate_token(&self, token: &str) -> Result<Authenticated, AuthFailure> {
        let hit = self
            .cache
            .get(token)
            .await
            .map_err(|e| AuthFailure::CacheUnavailable(e.to_string()))?;
        match hit {
            Some(context) => Ok(Authenticated { context, fresh_token: None }),
            None => Err(AuthFailure::ExpiredOrUnknownToken),
        }
    }

    async fn login(&self, username: &str, secret: &str) -> Result<Authenticated, AuthFailure> {
        let record = self
            .store
            .lookup(username)
            .await
            .map_err(|e| AuthFailure::StoreUnavailable(e.to_string()))?;
        let Some(principal) = record else {
            // Burn an equivalent verification so unknown-principal and
            // bad-secret paths are indistinguishable from outside.
            burn_verification(secret);
            warn!("login rejected user={} reason=unknown", username);
            return Err(AuthFailure::UnknownPrincipal);
        };
        if !principal.is_active {
            burn_verification(secret);
            warn!("login rejected user={} reason=inactive", username);
            return Err(AuthFailure::InactivePrincipal);
        }
        if !verify_password(&principal.password_hash, secret) {
            warn!("login rejected user={} reason=secret_mismatch", username);
            return Err(AuthFailure::BadSecret);
        }

        let context = AuthContext::issue(&principal, self.token_ttl);
        let token = mint_token();
        // A put failure must not grant access: fail closed.
        self.cache
            .put(&token, context.clone())
            .await
            .map_err(|e| AuthFailure::CacheUnavailable(e.to_string()))?;
        info!(
            "login ok user={} role={:?} workspaces={} ttl_secs={}",
            username,
            context.role,
            context.workspaces.len(),
            self.token_ttl.as_secs()
        );
        Ok(Authenticated { context, fresh_token: Some(token) })
    }
}
