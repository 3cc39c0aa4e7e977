use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;

use crate::error::TokenError;
use crate::provider::TokenProvider;
use crate::token::AccessToken;

/// The signed-in user as seen by the dashboard.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: String,
    email: Option<String>,
    token: AccessToken,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: AccessToken) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            token,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn token(&self) -> &AccessToken {
        &self.token
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("token", &self.token)
            .finish()
    }
}

/// In-process identity session.
///
/// Holds at most one [`Principal`]. Reads are lock-free (`ArcSwapOption`), so
/// a `Session` can sit behind an `Arc` and serve concurrent requests while
/// another task signs out or installs a refreshed token.
///
/// The session does not refresh tokens on its own: whoever owns the external
/// login flow calls [`refresh_token`](Self::refresh_token) when a new ID token
/// is issued.
#[derive(Default)]
pub struct Session {
    current: ArcSwapOption<Principal>,
}

impl Session {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with `principal` already signed in.
    #[must_use]
    pub fn signed_in(principal: Principal) -> Self {
        let session = Self::new();
        session.sign_in(principal);
        session
    }

    /// Sign `principal` in, replacing any previous principal.
    pub fn sign_in(&self, principal: Principal) {
        tracing::info!(user_id = %principal.user_id, "principal signed in");
        self.current.store(Some(Arc::new(principal)));
    }

    /// Sign the current principal out. Returns it, if any.
    pub fn sign_out(&self) -> Option<Arc<Principal>> {
        let previous = self.current.swap(None);
        if let Some(p) = &previous {
            tracing::info!(user_id = %p.user_id, "principal signed out");
        }
        previous
    }

    /// Install a new token for the signed-in principal.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthenticated`] if nobody is signed in.
    pub fn refresh_token(&self, token: AccessToken) -> Result<(), TokenError> {
        let mut result = Err(TokenError::Unauthenticated);
        self.current.rcu(|current| match current.as_ref() {
            None => {
                result = Err(TokenError::Unauthenticated);
                None
            }
            Some(p) => {
                result = Ok(());
                Some(Arc::new(Principal {
                    token: token.clone(),
                    ..Principal::clone(p)
                }))
            }
        });
        if result.is_ok() {
            tracing::debug!("session token refreshed");
        }
        result
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<Principal>> {
        self.current.load_full()
    }

    #[must_use]
    pub fn current_user_id(&self) -> Option<String> {
        self.current
            .load()
            .as_ref()
            .map(|p| p.user_id.clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current.load().is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.current_user_id())
            .finish()
    }
}

#[async_trait]
impl TokenProvider for Session {
    async fn get_token(&self) -> Result<AccessToken, TokenError> {
        let guard = self.current.load();
        let Some(principal) = guard.as_ref() else {
            return Err(TokenError::Unauthenticated);
        };
        if principal.token.is_empty() {
            return Err(TokenError::unavailable("signed-in principal has no token"));
        }
        Ok(principal.token.clone())
    }
}
