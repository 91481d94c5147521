use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RbxError, Result};
use crate::http::{verify, ApiRequest, AuthMode, HttpDispatcher};

/// A credential that must never end up in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// The account a session is logged in as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: u64,
    #[serde(rename = "name")]
    pub username: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyScope {
    pub name: String,
    #[serde(default)]
    pub operations: Vec<String>,
}

/// What the API-key introspection endpoint reports about a key.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub authorized_user_id: Option<u64>,
    #[serde(default)]
    pub scopes: Vec<ApiKeyScope>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub expired: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Clone)]
struct LoginState {
    secret: Secret,
    identity: Identity,
    authenticated_at: SystemTime,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Credentials and identity for one account.
///
/// Shared behind an `Arc` by every request and entity acting for the account.
/// The CSRF token is replaced whenever the remote API hands out a new one.
#[derive(Default)]
pub struct Session {
    login: RwLock<Option<LoginState>>,
    // Set only by `with_secret` for unverified sessions; `login` stores the secret in `LoginState`.
    pending_secret: RwLock<Option<Secret>>,
    api_key: RwLock<Option<Secret>>,
    scopes: RwLock<HashSet<String>>,
    csrf_token: RwLock<Option<String>>,
    logged_in: AtomicBool,
}

impl Session {
    /// An unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session carrying a secret that has not been verified; `is_logged_in()` stays false.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        let session = Self::new();
        *write(&session.pending_secret) = Some(Secret::new(secret));
        session
    }

    /// Exchange `secret` for a verified identity.
    ///
    /// On 401/403 this fails with [`RbxError::AuthenticationFailure`] and the
    /// session is left exactly as it was. Login itself is never retried.
    pub async fn login(
        &self,
        dispatcher: &HttpDispatcher,
        secret: impl Into<String>,
    ) -> Result<()> {
        let secret = Secret::new(secret);
        if secret.is_empty() {
            return Err(RbxError::AuthenticationFailure);
        }

        let candidate = Session::with_secret(secret.expose());
        let request = ApiRequest::get("/v1/users/authenticated")
            .subdomain("users")
            .auth(AuthMode::Cookie)
            .silence_errors();
        let response = dispatcher.send(Some(&candidate), request).await?;

        if matches!(response.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = %response.status, "login rejected");
            return Err(RbxError::AuthenticationFailure);
        }
        let identity: Identity = verify::translate(response)?.json("authenticated user")?;

        info!(user_id = identity.id, username = %identity.username, "session authenticated");
        *write(&self.login) = Some(LoginState {
            secret,
            identity,
            authenticated_at: SystemTime::now(),
        });
        *write(&self.pending_secret) = None;
        *write(&self.csrf_token) = None;
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Forget the identity, secret and CSRF token. API-key state is kept.
    pub fn logout(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
        *write(&self.login) = None;
        *write(&self.pending_secret) = None;
        *write(&self.csrf_token) = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    /// Logged in with a cookie, or holding an API key.
    pub fn is_authenticated(&self) -> bool {
        self.is_logged_in() || self.api_key().is_some_and(|k| !k.is_empty())
    }

    /// The cookie secret: the verified one after login, else an unverified one from `with_secret`.
    pub fn secret(&self) -> Option<Secret> {
        if let Some(login) = read(&self.login).as_ref() {
            return Some(login.secret.clone());
        }
        read(&self.pending_secret).clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        read(&self.login).as_ref().map(|l| l.identity.clone())
    }

    pub fn user_id(&self) -> Option<u64> {
        read(&self.login).as_ref().map(|l| l.identity.id)
    }

    pub fn username(&self) -> Option<String> {
        read(&self.login).as_ref().map(|l| l.identity.username.clone())
    }

    pub fn display_name(&self) -> Option<String> {
        read(&self.login).as_ref().map(|l| l.identity.display_name.clone())
    }

    pub fn authenticated_at(&self) -> Option<SystemTime> {
        read(&self.login).as_ref().map(|l| l.authenticated_at)
    }

    pub fn time_since_authentication(&self) -> Option<Duration> {
        self.authenticated_at()
            .map(|at| at.elapsed().unwrap_or_default())
    }

    pub fn csrf_token(&self) -> Option<String> {
        read(&self.csrf_token).clone()
    }

    /// Last writer wins; any fresh token is usable.
    pub fn set_csrf_token(&self, token: impl Into<String>) {
        *write(&self.csrf_token) = Some(token.into());
    }

    pub fn api_key(&self) -> Option<Secret> {
        read(&self.api_key).clone()
    }

    /// Replace the API key. Previously granted scopes belonged to the old key and are dropped.
    pub fn set_api_key(&self, key: impl Into<String>) {
        *write(&self.api_key) = Some(Secret::new(key));
        write(&self.scopes).clear();
    }

    pub fn clear_api_key(&self) {
        *write(&self.api_key) = None;
        write(&self.scopes).clear();
    }

    pub fn grant_scopes<I, S>(&self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        write(&self.scopes).extend(scopes.into_iter().map(Into::into));
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        read(&self.scopes).contains(scope)
    }

    /// Ask the remote API which scopes the current key carries and record them.
    ///
    /// Each scope is granted both as `name` and as `name:operation` for every operation.
    pub async fn introspect_api_key(&self, dispatcher: &HttpDispatcher) -> Result<ApiKeyInfo> {
        let key = self
            .api_key()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RbxError::InvalidArgument("no API key set on this session".into()))?;

        let request = ApiRequest::post("/api-keys/v1/introspect")
            .subdomain("apis")
            .json(&serde_json::json!({ "apiKey": key.expose() }))?;
        let info: ApiKeyInfo = dispatcher.send_json(Some(self), request).await?;

        if !info.enabled || info.expired {
            warn!(enabled = info.enabled, expired = info.expired, "API key is not usable");
            return Err(RbxError::AuthenticationFailure);
        }

        let mut granted = Vec::new();
        for scope in &info.scopes {
            granted.push(scope.name.clone());
            for operation in &scope.operations {
                granted.push(format!("{}:{}", scope.name, operation));
            }
        }
        info!(scopes = granted.len(), "API key introspected");
        self.grant_scopes(granted);
        Ok(info)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("logged_in", &self.is_logged_in())
            .field("identity", &self.identity())
            .field("has_api_key", &self.api_key().is_some())
            .field("has_csrf_token", &self.csrf_token().is_some())
            .finish()
    }
}
