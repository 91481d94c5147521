//! # Scripted transport for tests
//!
//! [`MockTransport`] implements [`Transport`] entirely in memory. Responses are
//! queued up front and handed out in order; every request the dispatcher sends
//! is recorded so tests can count network calls and inspect headers.
//!
//! ```
//! use std::sync::Arc;
//! use rbxweb::http::mock::{MockResponse, MockTransport};
//! use rbxweb::{ApiRequest, ClientConfig, HttpDispatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(MockTransport::new());
//!     transport.push(MockResponse::json(200, serde_json::json!({ "id": 1 })));
//!
//!     let dispatcher = HttpDispatcher::with_transport(ClientConfig::default(), transport.clone());
//!     let body = dispatcher.send_string(None, ApiRequest::get("/v1/users/1")).await.unwrap();
//!
//!     assert_eq!(body, r#"{"id":1}"#);
//!     assert_eq!(transport.call_count(), 1);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use crate::error::{RbxError, Result};
use crate::http::transport::{OutboundRequest, RawResponse, Transport};

/// A canned response; the method and URL are filled in from the request it answers.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl MockResponse {
    /// Panics on a status outside 100..=999; mocks only run in tests.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("mock status code"),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::text(status, body.to_string())
    }

    /// Panics on a value that is not a legal header value.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        let value = HeaderValue::from_str(value).expect("mock header value");
        self.headers.insert(HeaderName::from_static(name), value);
        self
    }
}

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unanswered request.
    pub fn push(&self, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn pending(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| {
                RbxError::Io(std::io::Error::other(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                )))
            })?;

        Ok(RawResponse {
            status: scripted.status,
            headers: scripted.headers,
            body: scripted.body,
            method: request.method,
            url: request.url,
        })
    }
}
