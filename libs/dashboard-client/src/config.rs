use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides [`ApiClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "DASHBOARD_API_URL";

/// Prefix for environment overrides of the remaining fields
/// (`DASHBOARD_REQUEST_TIMEOUT=30s`, `DASHBOARD_USER_AGENT=...`).
pub const ENV_PREFIX: &str = "DASHBOARD_";

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("dashboard-client/", env!("CARGO_PKG_VERSION"));

/// Default response body limit (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Settings for [`ApiClient`](crate::ApiClient).
///
/// The client reads this once at construction and never looks at the process
/// environment itself. Use [`load`](Self::load) in binaries and plain struct
/// literals (or [`Default`]) in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiClientConfig {
    /// Scheme and authority (optionally a path prefix) prepended to every
    /// endpoint path.
    pub base_url: String,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Per-request timeout. `None` waits as long as the transport does.
    #[serde(with = "humantime_opt")]
    pub request_timeout: Option<Duration>,

    /// How long idle pooled connections are kept. `None` keeps them forever.
    #[serde(with = "humantime_opt")]
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum response body size in bytes
    pub max_body_size: usize,

    /// Allow plain `http://` to non-loopback hosts.
    ///
    /// `http://localhost`, `http://127.0.0.1` and `http://[::1]` are always
    /// accepted so the local development default works out of the box.
    pub allow_insecure_http: bool,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: None,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_insecure_http: false,
        }
    }
}

impl ApiClientConfig {
    /// Layered load: defaults, then the optional YAML file, then
    /// `DASHBOARD_*` environment variables, then [`BASE_URL_ENV`].
    ///
    /// A missing YAML file is not an error; callers that require the file
    /// should check for it first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if a layer cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let config = Self::load_layers(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`load`](Self::load) without validation, for callers
    /// that apply their own overrides (CLI flags) and validate afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if a layer cannot be parsed.
    pub fn load_layers(path: Option<&Path>) -> Result<Self, ApiError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["API_URL", "ID_TOKEN"]))
            .merge(Env::raw().only(&[BASE_URL_ENV]).map(|_| "base_url".into()))
            .extract()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        tracing::debug!(base_url = %config.base_url, "loaded API client configuration");
        Ok(config)
    }

    /// Check the base URL and transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the base URL is not an absolute
    /// `http`/`https` URL without query, if plain `http` targets a
    /// non-loopback host while [`allow_insecure_http`](Self::allow_insecure_http)
    /// is off, or if `max_body_size` is zero.
    pub fn validate(&self) -> Result<(), ApiError> {
        let uri: http::Uri = self
            .base_url
            .parse()
            .map_err(|e| ApiError::Config(format!("base_url '{}': {e}", self.base_url)))?;

        let Some(authority) = uri.authority() else {
            return Err(ApiError::Config(format!(
                "base_url '{}': missing host",
                self.base_url
            )));
        };
        if uri.query().is_some() {
            return Err(ApiError::Config(format!(
                "base_url '{}': query strings are not supported",
                self.base_url
            )));
        }

        match uri.scheme_str() {
            Some("https") => {}
            Some("http") => {
                if !self.allow_insecure_http && !is_loopback(authority.host()) {
                    return Err(ApiError::Config(format!(
                        "base_url '{}': plain http is only allowed for loopback hosts \
                         unless allow_insecure_http is set",
                        self.base_url
                    )));
                }
            }
            Some(other) => {
                return Err(ApiError::Config(format!(
                    "base_url '{}': unsupported scheme '{other}'",
                    self.base_url
                )));
            }
            None => {
                return Err(ApiError::Config(format!(
                    "base_url '{}': missing scheme",
                    self.base_url
                )));
            }
        }

        if self.max_body_size == 0 {
            return Err(ApiError::Config("max_body_size must be positive".to_owned()));
        }
        Ok(())
    }

    /// Base URL with trailing slashes removed, ready for `base + path`.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn is_loopback(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

/// `Option<Duration>` as a humantime string (`"30s"`, `"1m 30s"`) or a plain
/// number of seconds.
mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Secs(secs)) => Ok(Some(Duration::from_secs(secs))),
            Some(Raw::Text(text)) => humantime::parse_duration(text.trim())
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}
