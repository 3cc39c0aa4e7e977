//! One HTTP round trip: send a fully built request, collect the body.
//!
//! [`HyperTransport`] is the production implementation (hyper client with
//! rustls, HTTP/1.1 and HTTP/2 via ALPN, pooled connections). The
//! [`Transport`] trait is the seam the request client talks to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::ApiClientConfig;
use crate::error::ApiError;

/// Sends one request and returns the response with its body fully read.
///
/// Implementations report network failures as [`ApiError::Transport`],
/// elapsed timeouts as [`ApiError::Timeout`] and oversized bodies as
/// [`ApiError::BodyTooLarge`]. Any HTTP status, including 4xx/5xx, is a
/// successful round trip; for a non-2xx status a body that cannot be read
/// (too large, broken stream) comes back empty instead of failing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        (**self).send(request).await
    }
}

/// hyper-based [`Transport`].
///
/// `Clone` is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Option<Duration>,
    max_body_size: usize,
}

impl HyperTransport {
    /// Build a transport from the connection-related fields of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if TLS initialization fails.
    pub fn new(config: &ApiClientConfig) -> Result<Self, ApiError> {
        let https = build_https_connector()?;

        let mut builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .http2_only(false);
        let client = builder.build::<_, Full<Bytes>>(https);

        if config.allow_insecure_http {
            tracing::warn!("plain http allowed for non-loopback hosts; use only for testing");
        }

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            max_body_size: config.max_body_size,
        })
    }

    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        let response = self
            .client
            .request(request.map(Full::new))
            .await
            .map_err(|e| ApiError::Transport(Box::new(e)))?;

        let (parts, body) = response.into_parts();
        let limit = self.max_body_size;
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            // The status already says the call failed; an unreadable body must not hide it
            Err(e) if !parts.status.is_success() => {
                tracing::debug!(
                    status = parts.status.as_u16(),
                    error = %e,
                    "error response body unreadable; treating as empty"
                );
                Bytes::new()
            }
            Err(e) if e.is::<LengthLimitError>() => return Err(ApiError::BodyTooLarge { limit }),
            Err(e) => return Err(ApiError::Transport(e)),
        };

        Ok(Response::from_parts(parts, body))
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(request))
                .await
                .map_err(|_| ApiError::Timeout(limit))?,
            None => self.round_trip(request).await,
        }
    }
}

/// Crypto provider for TLS: the process default if one is installed,
/// otherwise a fresh aws-lc-rs provider (not installed globally).
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// HTTPS connector with webpki roots. Plain `http` is let through here;
/// the scheme policy is enforced by [`ApiClientConfig::validate`].
fn build_https_connector() -> Result<HttpsConnector<HttpConnector>, ApiError> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| ApiError::Config(format!("TLS initialization failed: {e}")))?
        .https_or_http()
        .enable_all_versions()
        .build();
    Ok(connector)
}
