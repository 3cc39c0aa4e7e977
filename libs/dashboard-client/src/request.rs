use std::fmt;

use bytes::Bytes;
use dashboard_auth::AccessToken;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use http::{Request, Uri};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// HTTP verbs the dashboard API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl ApiMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub fn to_http(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing call, before the token and base URL are applied.
///
/// Consumed by [`ApiClient::request`](crate::ApiClient::request).
///
/// # Example
///
/// ```ignore
/// let descriptor = RequestDescriptor::put("/api/user/profile")
///     .json(&serde_json::json!({ "name": "Ada" }))?
///     .header("x-request-id", "abc123");
/// let updated = client.request(descriptor).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use = "RequestDescriptor does nothing until passed to ApiClient::request"]
pub struct RequestDescriptor {
    method: ApiMethod,
    path: String,
    body: Option<Value>,
    headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Delete, path)
    }

    /// Set the body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if `body` cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("body is not valid JSON: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header override.
    ///
    /// Overrides replace the default `Content-Type` and `User-Agent` headers.
    /// `Authorization` always carries the provider token and cannot be
    /// overridden.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn method(&self) -> ApiMethod {
        self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn header_overrides(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Build the wire request: `base_url + path`, mandatory headers, overrides,
    /// compact JSON body.
    pub(crate) fn into_http(
        self,
        base_url: &str,
        token: &AccessToken,
        user_agent: &HeaderValue,
    ) -> Result<Request<Bytes>, ApiError> {
        if !self.path.starts_with('/') {
            return Err(ApiError::InvalidRequest(format!(
                "endpoint path must start with '/': '{}'",
                self.path
            )));
        }

        let url = format!("{base_url}{}", self.path);
        let uri: Uri = url
            .parse()
            .map_err(|e| ApiError::InvalidRequest(format!("invalid URL '{url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer_value(token)?);
        headers.insert(USER_AGENT, user_agent.clone());

        for (name, value) in self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ApiError::InvalidRequest(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value)
                .map_err(|e| ApiError::InvalidRequest(format!("header '{name}' value: {e}")))?;
            if name == AUTHORIZATION {
                tracing::warn!(
                    path = %self.path,
                    "ignoring Authorization header override; the provider token is always used"
                );
                continue;
            }
            headers.insert(name, value);
        }

        let body = match &self.body {
            Some(value) => Bytes::from(serde_json::to_vec(value).map_err(|e| {
                ApiError::InvalidRequest(format!("body serialization failed: {e}"))
            })?),
            None => Bytes::new(),
        };

        let mut request = Request::new(body);
        *request.method_mut() = self.method.to_http();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

fn bearer_value(token: &AccessToken) -> Result<HeaderValue, ApiError> {
    let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose()));
    let mut value = HeaderValue::from_str(&raw).map_err(|_| {
        ApiError::TokenUnavailable("token contains invalid header characters".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ua() -> HeaderValue {
        HeaderValue::from_static("dashboard-client/test")
    }

    fn build(descriptor: RequestDescriptor) -> Result<Request<Bytes>, ApiError> {
        descriptor.into_http("http://localhost:8000", &AccessToken::new("tok-1"), &ua())
    }

    #[test]
    fn mandatory_headers_are_set() {
        let req = build(RequestDescriptor::get("/api/protected")).unwrap();

        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(req.uri(), "http://localhost:8000/api/protected");
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer tok-1");
        assert!(req.headers()[AUTHORIZATION].is_sensitive());
        assert_eq!(req.headers()[USER_AGENT], "dashboard-client/test");
        assert!(req.body().is_empty());
    }

    #[test]
    fn put_body_is_compact_json() {
        let req = build(
            RequestDescriptor::put("/api/user/profile")
                .json(&json!({"name": "Ada"}))
                .unwrap(),
        )
        .unwrap();

        assert_eq!(req.method(), http::Method::PUT);
        assert_eq!(req.body().as_ref(), br#"{"name":"Ada"}"#);
    }

    #[test]
    fn typed_body_serializes() {
        #[derive(Serialize)]
        struct Meta<'a> {
            filename: &'a str,
            width: u32,
        }

        let d = RequestDescriptor::post("/api/upload/metadata")
            .json(&Meta {
                filename: "a.png",
                width: 640,
            })
            .unwrap();
        assert_eq!(
            d.json_body(),
            Some(&json!({"filename": "a.png", "width": 640}))
        );
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let mut m: HashMap<(u8, u8), u8> = HashMap::new();
        m.insert((1, 2), 3);
        let err = RequestDescriptor::post("/x").json(&m).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn overrides_replace_defaults() {
        let req = build(
            RequestDescriptor::get("/api/protected")
                .header("Content-Type", "application/vnd.api+json")
                .header("X-Request-Id", "abc"),
        )
        .unwrap();

        let content_types: Vec<_> = req.headers().get_all(CONTENT_TYPE).iter().collect();
        assert_eq!(content_types, vec!["application/vnd.api+json"]);
        assert_eq!(req.headers()["x-request-id"], "abc");
    }

    #[test]
    fn authorization_override_is_ignored() {
        let req = build(
            RequestDescriptor::get("/api/protected").header("authorization", "Bearer forged"),
        )
        .unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer tok-1");
    }

    #[test]
    fn relative_path_without_slash_is_rejected() {
        let err = build(RequestDescriptor::get("api/protected")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = build(RequestDescriptor::get("/x").header("bad header", "v")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(ref m) if m.contains("bad header")));
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = RequestDescriptor::get("/x")
            .into_http("http://localhost", &AccessToken::new("a\nb"), &ua())
            .unwrap_err();
        assert_eq!(err.kind(), "token_unavailable");
    }

    #[test]
    fn method_labels() {
        assert_eq!(ApiMethod::default(), ApiMethod::Get);
        assert_eq!(ApiMethod::Delete.to_string(), "DELETE");
        assert_eq!(ApiMethod::Post.to_http(), http::Method::POST);
    }
}
