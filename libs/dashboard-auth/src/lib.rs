#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Identity boundary for the dashboard API client.
//!
//! The request client never talks to an identity vendor directly. It asks a
//! [`TokenProvider`] for a bearer token once per request and forwards whatever
//! comes back. This crate defines that capability and two implementations:
//!
//! - [`Session`]: an in-process identity session holding the signed-in
//!   [`Principal`]. Sign-in, sign-out and token refresh are driven by the
//!   caller (e.g. after an external login flow issues an ID token).
//! - [`StaticTokenProvider`]: a fixed token, for service accounts and tests.
//!
//! # Example
//!
//! ```
//! use dashboard_auth::{AccessToken, Principal, Session, TokenProvider};
//!
//! # async fn demo() -> Result<(), dashboard_auth::TokenError> {
//! let session = Session::new();
//! session.sign_in(Principal::new("user-1", AccessToken::new("id-token")));
//!
//! let token = session.get_token().await?;
//! assert_eq!(token.expose(), "id-token");
//! # Ok(())
//! # }
//! ```

mod error;
mod provider;
mod session;
mod token;

pub use error::TokenError;
pub use provider::{StaticTokenProvider, TokenProvider};
pub use session::{Principal, Session};
pub use token::AccessToken;
