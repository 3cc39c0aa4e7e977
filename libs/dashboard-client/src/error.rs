use std::time::Duration;

use dashboard_auth::TokenError;
use thiserror::Error;

/// Errors returned by [`ApiClient`](crate::ApiClient) and the endpoint facade.
///
/// Match on the variant, not on the rendered message. [`kind`](Self::kind)
/// gives a stable label for logs and metrics.
///
/// Caller obligations: on [`Unauthenticated`](Self::Unauthenticated) send the
/// user back through sign-in; on [`RequestFailed`](Self::RequestFailed) show
/// the server message. The client itself never retries.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// No principal is signed in. No request was sent.
    #[error("no authenticated user")]
    Unauthenticated,

    /// The token provider failed for another reason. No request was sent.
    #[error("token unavailable: {0}")]
    TokenUnavailable(String),

    /// The server answered with a status outside 200-299.
    ///
    /// `message` is the server's `detail` when it sent one, otherwise
    /// `HTTP error! status: <code>`.
    #[error("{message}")]
    RequestFailed {
        status: http::StatusCode,
        message: String,
        /// Raw `detail` value from the error body, if any
        detail: Option<serde_json::Value>,
    },

    /// A success response body was not valid JSON (or not the expected shape).
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Network failure before any HTTP status was received.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The configured request timeout elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body exceeded the configured size limit.
    #[error("response body too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The request could not be built (bad path, header or body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A facade payload was rejected before sending.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Stable, low-cardinality label for this error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::TokenUnavailable(_) => "token_unavailable",
            Self::RequestFailed { .. } => "request_failed",
            Self::Decode(_) => "decode",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
        }
    }

    /// HTTP status for [`RequestFailed`](Self::RequestFailed), `None` otherwise.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthenticated => Self::Unauthenticated,
            TokenError::Unavailable(reason) => Self::TokenUnavailable(reason),
            other => Self::TokenUnavailable(other.to_string()),
        }
    }
}
