#![allow(clippy::unwrap_used, clippy::expect_used)]

//! In-memory transport and token provider for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashboard_auth::{AccessToken, TokenError, TokenProvider};
use http::{Request, Response, StatusCode};

use crate::error::ApiError;
use crate::transport::Transport;

/// Records every request and answers with a canned status and body.
pub struct RecordingTransport {
    status: StatusCode,
    body: Bytes,
    requests: Mutex<Vec<Request<Bytes>>>,
}

impl RecordingTransport {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::from(body.to_owned()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok_json(body: &str) -> Self {
        Self::new(200, body)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Method, URI, authorization header and body of the last request.
    pub fn last(&self) -> (http::Method, String, String, Bytes) {
        let requests = self.requests.lock().unwrap();
        let req = requests.last().expect("no request recorded");
        (
            req.method().clone(),
            req.uri().to_string(),
            req.headers()[http::header::AUTHORIZATION]
                .to_str()
                .unwrap()
                .to_owned(),
            req.body().clone(),
        )
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        self.requests.lock().unwrap().push(request);
        Ok(Response::builder()
            .status(self.status)
            .body(self.body.clone())
            .unwrap())
    }
}

/// Transport that always fails with a connection error.
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        Err(ApiError::Transport("connection refused".into()))
    }
}

/// Hands out `tok-1`, `tok-2`, ... on successive calls.
#[derive(Default)]
pub struct RotatingTokens {
    issued: AtomicUsize,
}

#[async_trait]
impl TokenProvider for RotatingTokens {
    async fn get_token(&self) -> Result<AccessToken, TokenError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(format!("tok-{n}")))
    }
}

/// Provider that is always temporarily unavailable.
pub struct UnavailableTokens;

#[async_trait]
impl TokenProvider for UnavailableTokens {
    async fn get_token(&self) -> Result<AccessToken, TokenError> {
        Err(TokenError::unavailable("identity backend offline"))
    }
}
