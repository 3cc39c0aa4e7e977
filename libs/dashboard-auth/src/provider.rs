use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TokenError;
use crate::token::AccessToken;

/// Capability that hands out a bearer token for the current principal.
///
/// The request client calls [`get_token`](Self::get_token) once per request
/// and never caches the result, so implementations are free to rotate tokens
/// between calls. Failures are propagated to the caller unchanged.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token for the currently signed-in principal.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthenticated`] when nobody is signed in,
    /// [`TokenError::Unavailable`] when the provider cannot issue a token now.
    async fn get_token(&self) -> Result<AccessToken, TokenError>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    async fn get_token(&self) -> Result<AccessToken, TokenError> {
        (**self).get_token().await
    }
}

/// Provider that always returns the same token.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<AccessToken, TokenError> {
        if self.token.is_empty() {
            return Err(TokenError::Unauthenticated);
        }
        Ok(self.token.clone())
    }
}
