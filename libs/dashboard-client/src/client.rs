use std::sync::Arc;

use dashboard_auth::TokenProvider;
use http::HeaderValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::builder::ApiClientBuilder;
use crate::endpoints::Endpoint;
use crate::error::ApiError;
use crate::request::{ApiMethod, RequestDescriptor};
use crate::response;
use crate::transport::Transport;

/// Authenticated JSON client for the dashboard backend.
///
/// Each call fetches a fresh token from the [`TokenProvider`], sends exactly
/// one request and decodes the JSON answer. Nothing is cached, retried or
/// reordered between calls.
///
/// # Thread Safety
///
/// `ApiClient` is `Clone + Send + Sync`. Clones share the token provider and
/// the transport (and therefore its connection pool).
///
/// # Example
///
/// ```ignore
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")
///     .token_provider(session.clone())
///     .build()?;
///
/// let data = client.get("/api/protected").await?;
/// let saved = client.put("/api/user/profile", &json!({ "name": "Ada" })).await?;
/// ```
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: Arc<str>,
    pub(crate) user_agent: HeaderValue,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Base URL every endpoint path is appended to (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one authenticated request and return the decoded JSON body.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unauthenticated`] / [`ApiError::TokenUnavailable`] if the
    ///   token provider fails (nothing is sent)
    /// - [`ApiError::InvalidRequest`] if the request cannot be built
    /// - [`ApiError::Transport`] / [`ApiError::Timeout`] /
    ///   [`ApiError::BodyTooLarge`] from the transport
    /// - [`ApiError::RequestFailed`] for any status outside 200-299
    /// - [`ApiError::Decode`] if a success body is not JSON
    ///
    /// Every error is logged before it is returned.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let method = descriptor.method();
        let path = descriptor.path().to_owned();
        self.execute(descriptor)
            .await
            .inspect_err(|e| log_failure(method, &path, e))
    }

    /// Like [`request`](Self::request), then deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`request`](Self::request) returns, plus
    /// [`ApiError::Decode`] if the JSON does not match `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let method = descriptor.method();
        let path = descriptor.path().to_owned();
        let value = self.request(descriptor).await?;
        serde_json::from_value(value)
            .map_err(ApiError::Decode)
            .inspect_err(|e| log_failure(method, &path, e))
    }

    /// `GET path`
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(RequestDescriptor::get(path)).await
    }

    /// `POST path` with `body` as JSON
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.send_with_body(RequestDescriptor::post(path), body).await
    }

    /// `PUT path` with `body` as JSON
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.send_with_body(RequestDescriptor::put(path), body).await
    }

    /// `DELETE path`
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(RequestDescriptor::delete(path)).await
    }

    /// Call a fixed endpoint binding with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn call(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<Value, ApiError> {
        tracing::debug!(endpoint = endpoint.name, "calling endpoint");
        let descriptor = endpoint.descriptor();
        let descriptor = match body {
            Some(body) => descriptor.body(body),
            None => descriptor,
        };
        self.request(descriptor).await
    }

    async fn send_with_body<B: Serialize + ?Sized>(
        &self,
        descriptor: RequestDescriptor,
        body: &B,
    ) -> Result<Value, ApiError> {
        let method = descriptor.method();
        let path = descriptor.path().to_owned();
        match descriptor.json(body) {
            Ok(descriptor) => self.request(descriptor).await,
            Err(e) => {
                log_failure(method, &path, &e);
                Err(e)
            }
        }
    }

    async fn execute(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        // Fetched per call; providers may rotate tokens between requests
        let token = self.tokens.get_token().await?;

        let request = descriptor.into_http(&self.base_url, &token, &self.user_agent)?;
        tracing::debug!(method = %request.method(), uri = %request.uri(), "sending API request");

        let response = self.transport.send(request).await?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), "API response received");

        if !status.is_success() {
            return Err(response::failure_from_status(status, response.body()));
        }
        response::decode_success(response.body())
    }
}

/// Log a failed call. Called on every error path before the error is returned.
pub(crate) fn log_failure(method: ApiMethod, path: &str, err: &ApiError) {
    match err {
        ApiError::RequestFailed { status, .. } => tracing::error!(
            method = %method,
            path,
            kind = err.kind(),
            status = status.as_u16(),
            error = %err,
            "API request failed"
        ),
        _ => tracing::error!(
            method = %method,
            path,
            kind = err.kind(),
            error = %err,
            "API request failed"
        ),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::testing::{FailingTransport, RecordingTransport, RotatingTokens, UnavailableTokens};
    use dashboard_auth::{AccessToken, Principal, Session, StaticTokenProvider};
    use serde::Deserialize;
    use serde_json::json;
    use tracing_test::traced_test;

    fn client_with(
        tokens: impl TokenProvider + 'static,
        transport: Arc<RecordingTransport>,
    ) -> ApiClient {
        ApiClient::builder()
            .token_provider(tokens)
            .transport(transport)
            .build()
            .unwrap()
    }

    fn static_tokens() -> StaticTokenProvider {
        StaticTokenProvider::new(AccessToken::new("tok"))
    }

    #[test]
    fn client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<ApiClient>();
    }

    #[tokio::test]
    async fn default_base_url_is_local_backend() {
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(static_tokens(), transport.clone());

        client.get("/api/protected").await.unwrap();

        let (method, uri, _, _) = transport.last();
        assert_eq!(method, http::Method::GET);
        assert_eq!(uri, "http://localhost:8000/api/protected");
    }

    #[tokio::test]
    async fn token_is_fetched_for_every_call() {
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(RotatingTokens::default(), transport.clone());

        client.get("/a").await.unwrap();
        assert_eq!(transport.last().2, "Bearer tok-1");

        client.get("/b").await.unwrap();
        assert_eq!(transport.last().2, "Bearer tok-2");
    }

    #[tokio::test]
    async fn session_refresh_is_picked_up_by_next_call() {
        let session = Arc::new(Session::signed_in(Principal::new(
            "ada",
            AccessToken::new("first"),
        )));
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(session.clone(), transport.clone());

        client.get("/api/protected").await.unwrap();
        assert_eq!(transport.last().2, "Bearer first");

        session.refresh_token(AccessToken::new("second")).unwrap();
        client.get("/api/protected").await.unwrap();
        assert_eq!(transport.last().2, "Bearer second");
    }

    #[tokio::test]
    #[traced_test]
    async fn signed_out_session_never_reaches_transport() {
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(Session::new(), transport.clone());

        let err = client.get("/api/protected").await.unwrap_err();

        assert!(err.is_unauthenticated());
        assert_eq!(transport.calls(), 0);
        assert!(logs_contain("API request failed"));
        assert!(logs_contain("unauthenticated"));
    }

    #[tokio::test]
    #[traced_test]
    async fn provider_failure_propagates_without_retry() {
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(UnavailableTokens, transport.clone());

        let err = client.get("/api/protected").await.unwrap_err();

        assert!(matches!(err, ApiError::TokenUnavailable(ref r) if r == "identity backend offline"));
        assert_eq!(transport.calls(), 0);
        assert!(logs_contain("token_unavailable"));
    }

    #[tokio::test]
    async fn success_body_is_returned_unchanged() {
        let body = json!({"items": [1, 2, 3], "owner": {"name": "Ada"}, "active": true});
        let transport = Arc::new(RecordingTransport::ok_json(&body.to_string()));
        let client = client_with(static_tokens(), transport);

        assert_eq!(client.get("/api/protected").await.unwrap(), body);
    }

    #[tokio::test]
    #[traced_test]
    async fn error_status_carries_code_and_detail() {
        let transport = Arc::new(RecordingTransport::new(404, r#"{"detail":"not found"}"#));
        let client = client_with(static_tokens(), transport);

        let err = client.get("/api/user/profile").await.unwrap_err();

        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "not found");
        assert!(logs_contain("request_failed"));
        assert!(logs_contain("status=404"));
    }

    #[tokio::test]
    async fn every_non_success_status_fails() {
        for code in [199_u16, 300, 301, 400, 401, 403, 409, 418, 500, 503] {
            let transport = Arc::new(RecordingTransport::new(code, ""));
            let client = client_with(static_tokens(), transport);

            let err = client.get("/x").await.unwrap_err();
            assert_eq!(err.status().map(|s| s.as_u16()), Some(code));
            assert!(err.to_string().contains(&code.to_string()));
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_success_body_is_decode_error() {
        let transport = Arc::new(RecordingTransport::ok_json("not json"));
        let client = client_with(static_tokens(), transport);

        let err = client.get("/api/protected").await.unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
        assert!(logs_contain("failed to decode response body"));
    }

    #[tokio::test]
    #[traced_test]
    async fn transport_failure_is_logged_and_returned() {
        let client = ApiClient::builder()
            .token_provider(static_tokens())
            .transport(FailingTransport)
            .build()
            .unwrap();

        let err = client.delete("/api/thing").await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert!(logs_contain("connection refused"));
    }

    #[tokio::test]
    async fn put_sends_compact_json() {
        let transport = Arc::new(RecordingTransport::ok_json(r#"{"name":"Ada"}"#));
        let client = client_with(static_tokens(), transport.clone());

        let echoed = client
            .put("/api/user/profile", &json!({"name": "Ada"}))
            .await
            .unwrap();

        let (method, _, _, body) = transport.last();
        assert_eq!(method, http::Method::PUT);
        assert_eq!(body.as_ref(), br#"{"name":"Ada"}"#);
        assert_eq!(echoed, json!({"name": "Ada"}));
    }

    #[tokio::test]
    async fn request_json_decodes_typed_value() {
        #[derive(Deserialize)]
        struct Profile {
            name: String,
        }

        let transport = Arc::new(RecordingTransport::ok_json(r#"{"name":"Ada","age":36}"#));
        let client = client_with(static_tokens(), transport);

        let profile: Profile = client
            .request_json(RequestDescriptor::get("/api/user/profile"))
            .await
            .unwrap();
        assert_eq!(profile.name, "Ada");

        let err = client
            .request_json::<Vec<String>>(RequestDescriptor::get("/api/user/profile"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unserializable_body_fails_before_sending() {
        let transport = Arc::new(RecordingTransport::ok_json("{}"));
        let client = client_with(static_tokens(), transport.clone());

        let mut bad = std::collections::BTreeMap::new();
        bad.insert(vec![1_u8], 1_u8);
        let err = client.post("/api/upload/metadata", &bad).await.unwrap_err();

        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(transport.calls(), 0);
    }
}
