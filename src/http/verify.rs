//! Local preconditions and the translation of failed responses into [`RbxError`]s.

use serde::Deserialize;
use tracing::warn;

use crate::error::{HttpFailure, RbxError, Result};
use crate::http::transport::RawResponse;
use crate::session::Session;

/// Require a session that can act on the account.
pub fn require_session(session: Option<&Session>) -> Result<&Session> {
    match session {
        Some(session) if session.is_authenticated() => Ok(session),
        _ => Err(RbxError::SessionRequired),
    }
}

/// Require an authenticated session holding the named API-key scope.
///
/// Runs before any network I/O, so a missing scope never costs a request.
pub fn require_scope<'a>(session: Option<&'a Session>, scope: &str) -> Result<&'a Session> {
    let session = require_session(session)?;
    if !session.has_scope(scope) {
        return Err(RbxError::InsufficientScope {
            scope: scope.to_string(),
        });
    }
    Ok(session)
}

// Legacy web APIs: {"errors":[{"code":0,"message":"...","userFacingMessage":"..."}]}
#[derive(Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEntry {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_facing_message: Option<String>,
}

// Open Cloud: {"code":"NOT_FOUND","message":"..."}
#[derive(Deserialize)]
struct CloudError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    message: String,
}

fn code_to_string(code: Option<serde_json::Value>) -> Option<String> {
    match code? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Pull a human message and error code out of a failure body, if it has a known shape.
fn extract_message(body: &str) -> Option<(String, Option<String>)> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let mut code = None;
        let mut messages = Vec::new();
        for entry in envelope.errors {
            let text = entry
                .user_facing_message
                .filter(|m| !m.trim().is_empty())
                .or(entry.message.filter(|m| !m.trim().is_empty()));
            if let Some(text) = text {
                if code.is_none() {
                    code = code_to_string(entry.code);
                }
                messages.push(text);
            }
        }
        if !messages.is_empty() {
            return Some((messages.join("; "), code));
        }
        return None;
    }

    let cloud: CloudError = serde_json::from_str(body).ok()?;
    if cloud.message.trim().is_empty() {
        return None;
    }
    Some((cloud.message, code_to_string(cloud.code)))
}

/// Pass 2xx responses through; turn everything else into a typed failure.
pub fn translate(response: RawResponse) -> Result<RawResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let failure = HttpFailure {
        status: response.status,
        method: response.method,
        url: response.url,
    };

    if failure.status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(method = %failure.method, url = %failure.url, "rate limited");
        return Err(RbxError::RateLimited(failure));
    }

    match extract_message(&response.body) {
        Some((message, code)) => Err(RbxError::RemoteApi {
            message,
            code,
            failure,
        }),
        None => Err(RbxError::UnknownRemoteFailure(failure)),
    }
}
