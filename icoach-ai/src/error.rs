//! Error types for icoach-ai
//!
//! Three layers:
//! - [`ProviderError`]: raw failure shape of one provider call (status + message)
//! - [`CallError`]: typed failure surfaced by the orchestration core
//! - [`ApiError`]: HTTP mapping for the service surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a single provider call
///
/// `message` may embed provider-specific text (status words, a
/// `"retryDelay": "Ns"` field) that the error classifier parses.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "provider error {}: {}", status, self.message),
            None => write!(f, "provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Transport-level failure with no HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

/// Stable tag prefixed to quota exhaustion errors
pub const QUOTA_EXHAUSTED_TAG: &str = "QUOTA_EXHAUSTED";
/// Stable tag prefixed to missing/deprecated model errors
pub const MODEL_DEPRECATED_TAG: &str = "MODEL_DEPRECATED";
/// Stable tag prefixed to unparseable evaluation output errors
pub const CRITICAL_JSON_TAG: &str = "CRITICAL_JSON_FAILURE";

/// Typed failure from the orchestration core
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Daily quota consumed; retrying today cannot help
    #[error("QUOTA_EXHAUSTED: {0}")]
    QuotaExhausted(String),

    /// Configured model is missing or deprecated; needs a config fix
    #[error("MODEL_DEPRECATED: {0}")]
    ModelDeprecated(String),

    /// A call succeeded but no response could be parsed as the expected JSON
    #[error("CRITICAL_JSON_FAILURE: {0}")]
    CriticalJson(String),

    /// Provider returned an empty body where text was required
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Request rejected before any provider call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Queued task was dropped before it produced a result
    #[error("Queued task aborted: {0}")]
    TaskAborted(String),

    /// Last provider error after retries were exhausted or ruled out
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CallError {
    /// Stable machine-checkable tag for failures the presentation layer
    /// branches on
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            CallError::QuotaExhausted(_) => Some(QUOTA_EXHAUSTED_TAG),
            CallError::ModelDeprecated(_) => Some(MODEL_DEPRECATED_TAG),
            CallError::CriticalJson(_) => Some(CRITICAL_JSON_TAG),
            _ => None,
        }
    }

    /// True when retrying cannot help (quota or model configuration)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallError::QuotaExhausted(_) | CallError::ModelDeprecated(_)
        )
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Orchestration failure
    #[error(transparent)]
    Call(#[from] CallError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// icoach-common error
    #[error("Common error: {0}")]
    Common(#[from] icoach_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Call(ref err) => {
                let status = match err {
                    CallError::QuotaExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
                    CallError::ModelDeprecated(_) => StatusCode::SERVICE_UNAVAILABLE,
                    CallError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                };
                let code = err.tag().unwrap_or(match err {
                    CallError::InvalidRequest(_) => "BAD_REQUEST",
                    _ => "PROVIDER_ERROR",
                });
                (status, code, err.to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
