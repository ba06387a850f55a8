//! Unified application error model and mapping helpers.
//! This module provides the external error enum resolved at the proxy boundary,
//! along with the HTTP status mapping. Internal subsystem failures are
//! translated into these variants before anything reaches a client.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Unauthenticated { code: String, message: String },
    Forbidden { code: String, message: String },
    InvalidOperation { code: String, message: String },
    UpstreamUnavailable { code: String, message: String },
    UpstreamError { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Unauthenticated { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::InvalidOperation { code, .. }
            | AppError::UpstreamUnavailable { code, .. }
            | AppError::UpstreamError { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthenticated { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::InvalidOperation { message, .. }
            | AppError::UpstreamUnavailable { message, .. }
            | AppError::UpstreamError { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn invalid_operation<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidOperation { code: code.into(), message: msg.into() } }
    pub fn upstream_unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::UpstreamUnavailable { code: code.into(), message: msg.into() } }
    pub fn upstream_error<S: Into<String>>(code: S, msg: S) -> Self { AppError::UpstreamError { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthenticated { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::InvalidOperation { .. } => 400,
            AppError::UpstreamUnavailable { .. } => 503,
            AppError::UpstreamError { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless translated at a subsystem seam
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}
