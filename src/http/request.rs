use reqwest::Method;
use serde::Serialize;

use crate::error::{RbxError, Result};
use crate::http::auth::AuthMode;

/// Which host a request is sent to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HostSelection {
    /// The dispatcher's configured default subdomain.
    #[default]
    Default,
    /// A subdomain rendered through the configured host template, e.g. `users`.
    Subdomain(String),
    /// A full base URL, bypassing the template.
    BaseUrl(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
}

impl RequestBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Text(_) => "text/plain; charset=utf-8",
        }
    }

    pub fn encode(&self) -> String {
        match self {
            RequestBody::Json(value) => value.to_string(),
            RequestBody::Text(text) => text.clone(),
        }
    }
}

/// Describes one logical call: what to send, where, and with which credentials.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the selected host, e.g. `/v1/users/1`.
    pub path: String,
    pub host: HostSelection,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub auth: AuthMode,
    /// API-key scope checked locally before any network I/O.
    pub scope: Option<String>,
    /// Return non-2xx responses as-is instead of translating them into errors.
    pub silence_errors: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            host: HostSelection::Default,
            query: Vec::new(),
            body: None,
            auth: AuthMode::None,
            scope: None,
            silence_errors: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.host = HostSelection::Subdomain(subdomain.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.host = HostSelection::BaseUrl(base_url.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| RbxError::parse("request body", e))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn silence_errors(mut self) -> Self {
        self.silence_errors = true;
        self
    }

    /// Everything but the read-only methods needs a CSRF token.
    pub fn is_state_changing(&self) -> bool {
        !matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }
}
