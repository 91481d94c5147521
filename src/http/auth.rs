use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};

use crate::error::{RbxError, Result};
use crate::session::Session;

/// Cookie carrying the account secret.
pub const AUTH_COOKIE: &str = ".ROBLOSECURITY";
/// Request and response header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Request header carrying an Open Cloud API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Which credentials a request must carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    None,
    Cookie,
    ApiKey,
    CookieAndApiKey,
}

impl AuthMode {
    pub fn uses_cookie(self) -> bool {
        matches!(self, AuthMode::Cookie | AuthMode::CookieAndApiKey)
    }

    pub fn uses_api_key(self) -> bool {
        matches!(self, AuthMode::ApiKey | AuthMode::CookieAndApiKey)
    }
}

fn sensitive_value(raw: &str, what: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(raw).map_err(|_| {
        RbxError::InvalidArgument(format!("{what} contains characters not allowed in a header"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Adds the credential headers `mode` asks for, plus the CSRF token when one is known.
///
/// Credentials the session doesn't hold are simply left off; the remote API
/// answers with 401/403 and the translator reports it.
pub fn apply_auth_headers(
    headers: &mut HeaderMap,
    session: Option<&Session>,
    mode: AuthMode,
    csrf_token: Option<&str>,
) -> Result<()> {
    if let Some(session) = session {
        if mode.uses_cookie() {
            if let Some(secret) = session.secret().filter(|s| !s.is_empty()) {
                let cookie = format!("{AUTH_COOKIE}={}", secret.expose());
                headers.insert(COOKIE, sensitive_value(&cookie, "session secret")?);
            }
        }
        if mode.uses_api_key() {
            if let Some(key) = session.api_key().filter(|k| !k.is_empty()) {
                headers.insert(
                    HeaderName::from_static(API_KEY_HEADER),
                    sensitive_value(key.expose(), "API key")?,
                );
            }
        }
    }

    if let Some(token) = csrf_token.filter(|t| !t.is_empty()) {
        headers.insert(
            HeaderName::from_static(CSRF_HEADER),
            sensitive_value(token, "CSRF token")?,
        );
    }
    Ok(())
}
