use std::fmt;

use reqwest::{Method, StatusCode};
use serde::Serialize;

/// Identity of a request that came back with a non-2xx status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpFailure {
    pub status: StatusCode,
    pub method: Method,
    pub url: String,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned {}", self.method, self.url, self.status)
    }
}

/// All errors surfaced by the dispatch, pooling and pagination layers.
#[derive(Debug, thiserror::Error)]
pub enum RbxError {
    #[error("Authentication failed: the secret was rejected")]
    AuthenticationFailure,

    #[error("A logged-in session is required for this call")]
    SessionRequired,

    #[error("The session's API key is missing the `{scope}` scope")]
    InsufficientScope { scope: String },

    #[error("Rate limited: {0}")]
    RateLimited(HttpFailure),

    #[error("{message} ({failure})")]
    RemoteApi {
        message: String,
        code: Option<String>,
        failure: HttpFailure,
    },

    #[error("Unknown remote failure: {0}")]
    UnknownRemoteFailure(HttpFailure),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to decode {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat classification of [`RbxError`] for callers that only care about the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthenticationFailure,
    SessionRequired,
    InsufficientScope,
    RateLimited,
    RemoteApi,
    UnknownRemoteFailure,
    InvalidArgument,
    Parse,
    Network,
    Io,
}

impl RbxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RbxError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            RbxError::SessionRequired => ErrorKind::SessionRequired,
            RbxError::InsufficientScope { .. } => ErrorKind::InsufficientScope,
            RbxError::RateLimited(_) => ErrorKind::RateLimited,
            RbxError::RemoteApi { .. } => ErrorKind::RemoteApi,
            RbxError::UnknownRemoteFailure(_) => ErrorKind::UnknownRemoteFailure,
            RbxError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RbxError::Parse { .. } => ErrorKind::Parse,
            RbxError::Network(_) => ErrorKind::Network,
            RbxError::Io(_) => ErrorKind::Io,
        }
    }

    /// The failed request, for errors that came from an HTTP response.
    pub fn http_failure(&self) -> Option<&HttpFailure> {
        match self {
            RbxError::RateLimited(failure)
            | RbxError::UnknownRemoteFailure(failure)
            | RbxError::RemoteApi { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub(crate) fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        RbxError::Parse {
            context: context.into(),
            source,
        }
    }
}

// Errors cross JSON boundaries (IPC, logs) as their display string.
impl Serialize for RbxError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RbxError>;
