use std::sync::Arc;
use std::time::Duration;

use dashboard_auth::TokenProvider;
use http::HeaderValue;

use crate::client::ApiClient;
use crate::config::ApiClientConfig;
use crate::error::ApiError;
use crate::transport::{HyperTransport, Transport};

/// Builder for [`ApiClient`].
///
/// A token provider is required. The transport defaults to a
/// [`HyperTransport`] built from the configuration.
#[must_use]
pub struct ApiClientBuilder {
    config: ApiClientConfig,
    tokens: Option<Arc<dyn TokenProvider>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self::with_config(ApiClientConfig::default())
    }

    pub fn with_config(config: ApiClientConfig) -> Self {
        Self {
            config,
            tokens: None,
            transport: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Per-request timeout (off by default)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Allow plain `http://` to non-loopback hosts (testing only).
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.allow_insecure_http = true;
        self
    }

    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.tokens = Some(Arc::new(provider));
        self
    }

    pub fn shared_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(provider);
        self
    }

    /// Replace the default hyper transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Validate the configuration and build the client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the configuration is invalid, no token
    /// provider was set, the user agent is not a valid header value, or TLS
    /// initialization fails.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        self.config.validate()?;

        let tokens = self
            .tokens
            .ok_or_else(|| ApiError::Config("a token provider is required".to_owned()))?;

        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| ApiError::Config(format!("user_agent: {e}")))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new(&self.config)?),
        };

        let base_url: Arc<str> = Arc::from(self.config.normalized_base_url());
        tracing::debug!(base_url = %base_url, "API client ready");

        Ok(ApiClient {
            base_url,
            user_agent,
            tokens,
            transport,
        })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
