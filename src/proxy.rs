//! Proxy orchestrator: per-request pipeline running authentication,
//! inspection and forwarding in sequence. Each stage either advances the
//! request or resolves it into exactly one external failure class; later
//! stages never run after a rejection.

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::identity::{AuthContext, Authenticator, Credential};
use crate::inspect::{inspect, variables_from_value, InspectionFailure, RuleSet};
use crate::upstream::{ForwardFailure, Forwarder};

/// Standard GraphQL-over-HTTP request body.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
    #[serde(rename = "operationName", default)]
    pub operation_name: Option<String>,
}

/// Terminal success: the upstream's answer, relayed verbatim. Upstream
/// HTTP error statuses also land here — their bodies carry the
/// GraphQL-level errors the client needs to see.
#[derive(Debug)]
pub struct Relayed {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

pub async fn run_pipeline(
    authenticator: &Authenticator,
    rules: &RuleSet,
    forwarder: &Forwarder,
    bearer: Option<&str>,
    request: GraphQLRequest,
    request_id: &str,
) -> Result<Relayed, AppError> {
    // Authenticating
    let Some(token) = bearer else {
        return Err(AppError::unauthenticated("unauthenticated", "missing bearer token"));
    };
    let context = authenticate_token(authenticator, token, request_id).await?;

    // Inspecting
    debug!("req={} stage=inspecting user={}", request_id, context.username);
    let variables = variables_from_value(request.variables)
        .map_err(|e| AppError::invalid_operation("invalid_document", e.as_str()))?;
    let approved = match inspect(&request.query, variables, &context, rules) {
        Ok(approved) => approved,
        Err(InspectionFailure::Parse(msg)) => {
            info!("req={} rejected stage=inspect reason=parse_error", request_id);
            return Err(AppError::invalid_operation("parse_error", msg.as_str()));
        }
        Err(InspectionFailure::InvalidDocument(msg)) => {
            info!("req={} rejected stage=inspect reason=invalid_document", request_id);
            return Err(AppError::invalid_operation("invalid_document", msg.as_str()));
        }
        Err(InspectionFailure::Forbidden { violations }) => {
            info!(
                "req={} rejected stage=inspect user={} violations={}",
                request_id,
                context.username,
                violations.len()
            );
            return Err(AppError::forbidden("forbidden", violations.join("; ").as_str()));
        }
    };
    if approved.rewritten {
        debug!("req={} document rewritten with workspace scope", request_id);
    }

    // Forwarding
    debug!("req={} stage=forwarding", request_id);
    let outcome = forwarder
        .forward(
            &approved.document,
            &approved.variables,
            request.operation_name.as_deref(),
            request_id,
            approved.has_mutation,
        )
        .await;
    match outcome {
        Ok(resp) => {
            info!("req={} relayed status={}", request_id, resp.status);
            Ok(Relayed { status: resp.status, content_type: resp.content_type, body: resp.body })
        }
        Err(ForwardFailure::UpstreamStatus { status, content_type, body }) => {
            info!("req={} relayed upstream error status={}", request_id, status);
            Ok(Relayed { status, content_type, body })
        }
        Err(ForwardFailure::Timeout) => {
            error!("req={} upstream timeout", request_id);
            Err(AppError::upstream_unavailable("upstream_timeout", "upstream timed out"))
        }
        Err(ForwardFailure::Unreachable(detail)) => {
            error!("req={} upstream unreachable: {}", request_id, detail);
            Err(AppError::upstream_unavailable("upstream_unreachable", "upstream unreachable"))
        }
    }
}

/// Resolve a bearer token into a context, folding every failure into the
/// uniform external Unauthenticated class. Infrastructure faults fail
/// closed and are logged with their internal detail.
pub async fn authenticate_token(
    authenticator: &Authenticator,
    token: &str,
    request_id: &str,
) -> Result<AuthContext, AppError> {
    debug!("req={} stage=authenticating", request_id);
    match authenticator.authenticate(Credential::Bearer { token: token.to_string() }).await {
        Ok(auth) => Ok(auth.context),
        Err(failure) if failure.is_internal() => {
            error!("req={} auth infrastructure failure: {}", request_id, failure);
            Err(AppError::unauthenticated("unauthenticated", "authentication unavailable"))
        }
        Err(failure) => {
            info!("req={} rejected stage=auth reason={}", request_id, failure);
            Err(AppError::unauthenticated("unauthenticated", "invalid or expired credentials"))
        }
    }
}
