//! Error types for the Buffer API client

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message reported for HTTP 429 responses.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Buffer allows 60 requests per minute.";

/// Message reported for HTTP 401/403 responses.
pub const AUTH_FAILED_MESSAGE: &str =
    "Authentication failed. Check your access token or run: bufferctl auth login";

/// Wait applied when a 429 response carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// HTTP 429. Recoverable by waiting `retry_after` seconds.
    #[serde(rename = "RATE_LIMITED")]
    RateLimited,
    /// HTTP 401 or 403. Recoverable only by re-authenticating.
    #[serde(rename = "AUTH_FAILED")]
    AuthFailed,
    /// Any other non-2xx response, or a 2xx body that could not be decoded.
    #[serde(rename = "API_ERROR")]
    Api,
    /// No response was received: network failure or timeout.
    #[serde(rename = "TRANSPORT_ERROR")]
    Transport,
}

impl ErrorCode {
    /// Wire/display name of the classification.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::Api => "API_ERROR",
            ErrorCode::Transport => "TRANSPORT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of a single API request.
///
/// `status` is 0 when no HTTP response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub code: ErrorCode,
    pub status: u16,
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// HTTP 429 with the server's (or default) wait hint.
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            message: RATE_LIMIT_MESSAGE.to_string(),
            code: ErrorCode::RateLimited,
            status: 429,
            retry_after: Some(retry_after),
        }
    }

    /// HTTP 401/403.
    pub fn auth_failed(status: u16) -> Self {
        Self {
            message: AUTH_FAILED_MESSAGE.to_string(),
            code: ErrorCode::AuthFailed,
            status,
            retry_after: None,
        }
    }

    /// Any other unsuccessful response.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::Api,
            status,
            retry_after: None,
        }
    }

    /// The request never produced a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::Transport,
            status: 0,
            retry_after: None,
        }
    }

    /// Report shape used by the output formatter.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::from(self)
    }
}

/// Displayable error record: `{code, message, retry_after}`.
///
/// `code` is a plain string so command handlers can report their own
/// failures (e.g. `CREATE_FAILED`) through the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorReport {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<&ApiError> for ErrorReport {
    fn from(error: &ApiError) -> Self {
        Self {
            code: error.code.as_str().to_string(),
            message: error.message.clone(),
            retry_after: error.retry_after,
        }
    }
}
