//!
//! flowgate HTTP server
//! --------------------
//! This module defines the Axum-based HTTP surface of the gateway.
//!
//! Responsibilities:
//! - Login endpoint minting bearer tokens backed by the identity module.
//! - Logout endpoint invalidating a live token.
//! - The `/graphql` proxy endpoint running the full pipeline.
//! - Wiring the credential store, session cache, rule set and forwarder
//!   into shared state at startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::{get, post}, Router, extract::State, Json};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::identity::{Authenticator, Credential, FilePrincipalStore, MokaTokenCache};
use crate::inspect::RuleSet;
use crate::proxy::{authenticate_token, run_pipeline, GraphQLRequest};
use crate::upstream::Forwarder;

/// Fixed hint returned with every upstream-unavailable response.
const RETRY_AFTER_SECS: &str = "5";

/// Upper bound on live sessions held by the in-process cache.
const MAX_CACHED_SESSIONS: u64 = 100_000;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub rules: Arc<RuleSet>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(FilePrincipalStore::load(&cfg.principals_path)?);
        let ttl = Duration::from_secs(cfg.token_ttl_secs);
        let cache = Arc::new(MokaTokenCache::new(ttl, MAX_CACHED_SESSIONS));
        let authenticator = Arc::new(Authenticator::new(store, cache, ttl));
        let rules = Arc::new(RuleSet::load(cfg.policy_path.as_deref())?);
        let forwarder = Arc::new(Forwarder::new(
            &cfg.upstream_url,
            Duration::from_secs(cfg.upstream_timeout_secs),
            cfg.upstream_concurrency,
        )?);
        Ok(Self { authenticator, rules, forwarder })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "flowgate ok" }))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/graphql", post(graphql))
        .with_state(state)
}

/// Start the gateway bound to the configured port.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&cfg)?;
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}, upstream {}", addr, cfg.upstream_url);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let rest = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

fn error_parts(err: &AppError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    if matches!(err, AppError::UpstreamUnavailable { .. }) {
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    }
    let body = serde_json::to_value(err).unwrap_or_else(|_| json!({"type": "internal"}));
    (status, headers, Json(body))
}

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let credential = Credential::Secret { username: payload.username, secret: payload.password };
    match state.authenticator.authenticate(credential).await {
        Ok(auth) => {
            let token = auth.fresh_token.unwrap_or_default();
            (StatusCode::OK, HeaderMap::new(), Json(json!({"token": token, "success": true})))
        }
        Err(failure) if failure.is_internal() => {
            error!("login infrastructure failure: {}", failure);
            // Fail closed, without naming the subsystem
            error_parts(&AppError::unauthenticated("unauthenticated", "authentication unavailable"))
        }
        // One uniform rejection for unknown user, bad secret and inactive user
        Err(_) => error_parts(&AppError::unauthenticated("unauthenticated", "invalid credentials")),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    let Some(token) = bearer_token(&headers) else {
        return error_parts(&AppError::unauthenticated("unauthenticated", "missing bearer token"));
    };
    if let Err(err) = authenticate_token(&state.authenticator, &token, &request_id).await {
        return error_parts(&err);
    }
    match state.authenticator.logout(&token).await {
        Ok(()) => (StatusCode::OK, HeaderMap::new(), Json(json!({"status": "ok"}))),
        Err(failure) => {
            error!("logout failure: {}", failure);
            error_parts(&AppError::internal("internal", "logout failed"))
        }
    }
}

async fn graphql(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GraphQLRequest>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let bearer = bearer_token(&headers);
    let outcome = run_pipeline(
        &state.authenticator,
        &state.rules,
        &state.forwarder,
        bearer.as_deref(),
        body,
        &request_id,
    )
    .await;
    match outcome {
        Ok(relayed) => {
            let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut headers = HeaderMap::new();
            let content_type = relayed
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
                .unwrap_or_else(|| HeaderValue::from_static("application/json"));
            headers.insert(header::CONTENT_TYPE, content_type);
            (status, headers, relayed.body).into_response()
        }
        Err(err) => error_parts(&err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz".to_string()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn retry_after_only_on_upstream_unavailable() {
        let (status, headers, _) =
            error_parts(&AppError::upstream_unavailable("upstream_timeout", "slow"));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "5");

        let (status, headers, _) = error_parts(&AppError::forbidden("forbidden", "no"));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(headers.get(header::RETRY_AFTER).is_none());
    }
}
