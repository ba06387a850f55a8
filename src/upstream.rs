//! Upstream forwarding: POST approved operations to the orchestration
//! server's GraphQL endpoint and relay the response.
//!
//! Outbound requests are built from scratch; nothing from the client's
//! header set crosses this boundary except the gateway-assigned request id.
//! A semaphore caps concurrent in-flight calls so a burst of clients cannot
//! fan out unbounded load onto the upstream.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::inspect::Variables;

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum ForwardFailure {
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    /// Upstream answered with an error status. The body is preserved so
    /// GraphQL-level errors stay visible to the client.
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16, content_type: Option<String>, body: String },
}

pub struct Forwarder {
    client: Client,
    endpoint: String,
    limiter: Semaphore,
}

impl Forwarder {
    pub fn new(endpoint: &str, timeout: Duration, max_in_flight: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flowgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            limiter: Semaphore::new(max_in_flight.max(1)),
        })
    }

    /// Forward one approved operation. Queries retry once on a transient
    /// transport failure; mutations are never retried.
    pub async fn forward(
        &self,
        document: &str,
        variables: &Variables,
        operation_name: Option<&str>,
        request_id: &str,
        is_mutation: bool,
    ) -> Result<UpstreamResponse, ForwardFailure> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ForwardFailure::Unreachable("admission queue closed".to_string()))?;

        let mut payload = json!({ "query": document, "variables": variables });
        if let Some(name) = operation_name {
            payload["operationName"] = json!(name);
        }

        let attempts = if is_mutation { 1 } else { 2 };
        let mut last_err = String::new();
        for attempt in 0..attempts {
            let sent = self
                .client
                .post(&self.endpoint)
                .header("x-request-id", request_id)
                .json(&payload)
                .send()
                .await;
            match sent {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let content_type = resp
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| ForwardFailure::Unreachable(e.to_string()))?;
                    if (200..300).contains(&status) {
                        return Ok(UpstreamResponse { status, content_type, body });
                    }
                    return Err(ForwardFailure::UpstreamStatus { status, content_type, body });
                }
                Err(e) if e.is_timeout() => return Err(ForwardFailure::Timeout),
                Err(e) if e.is_connect() && attempt + 1 < attempts => {
                    warn!("upstream connect failed, retrying once: {}", e);
                    last_err = e.to_string();
                    continue;
                }
                Err(e) => return Err(ForwardFailure::Unreachable(e.to_string())),
            }
        }
        Err(ForwardFailure::Unreachable(last_err))
    }
}
