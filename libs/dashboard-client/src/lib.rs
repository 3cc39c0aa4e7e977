#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated JSON API client for the dashboard backend.
//!
//! This crate provides:
//! - [`ApiClient`]: attaches `Authorization: Bearer <token>` and
//!   `Content-Type: application/json` to every request, fetching a fresh token
//!   from a [`TokenProvider`] for each call
//! - [`DashboardApi`]: the typed endpoint facade (profile read/update,
//!   protected data, image metadata upload)
//! - [`ApiClientConfig`]: base URL and transport settings, loadable from YAML
//!   and environment via `figment`
//! - [`ApiError`]: one variant per failure kind, so callers can tell
//!   "sign in again" from "server said no" from "network is down"
//!
//! Every failure is logged through `tracing` before it is returned; nothing is
//! retried or swallowed.
//!
//! # Example
//!
//! ```ignore
//! use dashboard_auth::{AccessToken, Principal, Session};
//! use dashboard_client::{ApiClientBuilder, ApiClientConfig, DashboardApi};
//! use std::sync::Arc;
//!
//! let session = Arc::new(Session::signed_in(Principal::new(
//!     "uid-1",
//!     AccessToken::new(id_token),
//! )));
//!
//! let client = ApiClientBuilder::with_config(ApiClientConfig::load(None)?)
//!     .token_provider(session)
//!     .build()?;
//!
//! let profile = client.get_user_profile().await?;
//! ```
//!
//! [`TokenProvider`]: dashboard_auth::TokenProvider

mod builder;
mod client;
mod config;
mod endpoints;
mod error;
mod request;
mod response;
mod transport;

#[cfg(test)]
mod testing;

pub use builder::ApiClientBuilder;
pub use client::ApiClient;
pub use config::{
    ApiClientConfig, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT,
    ENV_PREFIX,
};
pub use endpoints::{
    DashboardApi, ENDPOINTS, Endpoint, GET_PROTECTED_DATA, GET_USER_PROFILE, JsonObject,
    UPDATE_USER_PROFILE, UPLOAD_IMAGE_METADATA,
};
pub use error::ApiError;
pub use request::{ApiMethod, RequestDescriptor};
pub use transport::{HyperTransport, Transport};

pub use http::StatusCode;

pub use dashboard_auth;
