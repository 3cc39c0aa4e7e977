use thiserror::Error;

/// Errors returned when a bearer token is requested.
///
/// Variants never carry token material, so they are safe to log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenError {
    /// No principal is signed in.
    #[error("no authenticated user")]
    Unauthenticated,

    /// The provider could not produce a token right now.
    #[error("token unavailable: {0}")]
    Unavailable(String),
}

impl TokenError {
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}
