use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{RbxError, Result};
use crate::http::auth::{apply_auth_headers, CSRF_HEADER};
use crate::http::request::{ApiRequest, HostSelection};
use crate::http::transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
use crate::http::verify;
use crate::session::Session;

/// Sends [`ApiRequest`]s on behalf of a session.
///
/// A state-changing request rejected with 403 and a fresh `x-csrf-token`
/// header is re-sent exactly once with that token; the token is stored on the
/// session so later requests start with it. Nothing else is ever retried.
pub struct HttpDispatcher {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl HttpDispatcher {
    /// A dispatcher backed by a pool of `reqwest` clients.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn resolve_url(&self, request: &ApiRequest) -> Result<Url> {
        let base = match &request.host {
            HostSelection::Default => self.config.default_host(),
            HostSelection::Subdomain(subdomain) => self.config.host_for(subdomain),
            HostSelection::BaseUrl(base) => base.clone(),
        };
        let raw = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| RbxError::InvalidArgument(format!("invalid request URL {raw}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn build_outbound(
        &self,
        session: Option<&Session>,
        request: &ApiRequest,
        url: &Url,
        csrf_token: Option<&str>,
    ) -> Result<OutboundRequest> {
        let mut headers = HeaderMap::new();
        apply_auth_headers(&mut headers, session, request.auth, csrf_token)?;
        if let Some(body) = &request.body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        }
        Ok(OutboundRequest {
            method: request.method.clone(),
            url: url.to_string(),
            headers,
            body: request.body.as_ref().map(|b| b.encode()),
        })
    }

    /// Send `request`, retrying once on a CSRF rejection.
    ///
    /// Non-2xx responses become errors unless the request asked to silence them.
    pub async fn send(
        &self,
        session: Option<&Session>,
        request: ApiRequest,
    ) -> Result<RawResponse> {
        if let Some(scope) = request.scope.as_deref() {
            verify::require_scope(session, scope)?;
        }

        let url = self.resolve_url(&request)?;
        let mut fresh_token: Option<String> = None;
        let mut attempt = 1;

        let response = loop {
            let csrf_token = fresh_token
                .clone()
                .or_else(|| session.and_then(Session::csrf_token));
            let outbound = self.build_outbound(session, &request, &url, csrf_token.as_deref())?;

            debug!(method = %request.method, %url, attempt, "sending request");
            let response = self.transport.execute(outbound).await?;

            if attempt == 1
                && response.status == StatusCode::FORBIDDEN
                && request.is_state_changing()
            {
                if let Some(token) = response.header(CSRF_HEADER).filter(|t| !t.is_empty()) {
                    info!(
                        method = %request.method,
                        %url,
                        "CSRF token rejected, retrying with a fresh one"
                    );
                    if let Some(session) = session {
                        session.set_csrf_token(token);
                    }
                    fresh_token = Some(token.to_string());
                    attempt += 1;
                    continue;
                }
            }
            break response;
        };

        debug!(method = %request.method, %url, status = %response.status, "response received");
        if request.silence_errors {
            return Ok(response);
        }
        verify::translate(response)
    }

    pub async fn send_string(
        &self,
        session: Option<&Session>,
        request: ApiRequest,
    ) -> Result<String> {
        Ok(self.send(session, request).await?.body)
    }

    /// Send and decode the body as `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        session: Option<&Session>,
        request: ApiRequest,
    ) -> Result<T> {
        let context = format!("{} {}", request.method, request.path);
        self.send(session, request).await?.json(&context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::auth::AuthMode;
    use crate::http::mock::{MockResponse, MockTransport};
    use reqwest::header::COOKIE;

    fn dispatcher() -> (HttpDispatcher, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = HttpDispatcher::with_transport(ClientConfig::default(), transport.clone());
        (dispatcher, transport)
    }

    fn csrf_rejection(token: &'static str) -> MockResponse {
        MockResponse::json(
            403,
            serde_json::json!({"errors":[{"code":0,"message":"Token Validation Failed"}]}),
        )
        .header(CSRF_HEADER, token)
    }

    #[tokio::test]
    async fn test_url_from_subdomain_and_query() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::text(200, "{}"));

        let request = ApiRequest::get("/v1/groups/5/users")
            .subdomain("groups")
            .query("limit", 10)
            .query("cursor", "a b");
        dispatcher.send(None, request).await.unwrap();

        assert_eq!(
            transport.requests()[0].url,
            "https://groups.roblox.com/v1/groups/5/users?limit=10&cursor=a+b"
        );
    }

    #[tokio::test]
    async fn test_base_url_override() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::text(200, ""));
        let request = ApiRequest::get("cloud/v2/universes/1").base_url("https://apis.roblox.com/");
        dispatcher.send(None, request).await.unwrap();
        assert_eq!(
            transport.requests()[0].url,
            "https://apis.roblox.com/cloud/v2/universes/1"
        );
    }

    #[tokio::test]
    async fn test_csrf_retry_once_then_success() {
        let (dispatcher, transport) = dispatcher();
        let session = Session::with_secret("secret");
        transport.push(csrf_rejection("fresh-token"));
        transport.push(MockResponse::text(200, "{}"));

        let request = ApiRequest::post("/v1/groups/1/join").auth(AuthMode::Cookie);
        dispatcher.send(Some(&session), request).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].header(CSRF_HEADER), None);
        assert_eq!(sent[1].header(CSRF_HEADER), Some("fresh-token"));
        assert_eq!(sent[1].header(COOKIE.as_str()), Some(".ROBLOSECURITY=secret"));
        assert_eq!(session.csrf_token().as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn test_second_csrf_rejection_is_not_retried() {
        let (dispatcher, transport) = dispatcher();
        let session = Session::new();
        transport.push(csrf_rejection("one"));
        transport.push(csrf_rejection("two"));

        let err = dispatcher
            .send(Some(&session), ApiRequest::delete("/v1/assets/1"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteApi);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_403_without_token_fails_immediately() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::text(403, "forbidden"));

        let err = dispatcher
            .send(None, ApiRequest::post("/v1/x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRemoteFailure);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_get_403_with_token_is_not_retried() {
        let (dispatcher, transport) = dispatcher();
        transport.push(csrf_rejection("tok"));

        let err = dispatcher.send(None, ApiRequest::get("/v1/x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteApi);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_not_retried() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::text(429, "").header(CSRF_HEADER, "tok"));

        let err = dispatcher.send(None, ApiRequest::patch("/v1/x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scope_checked_before_network() {
        let (dispatcher, transport) = dispatcher();
        let session = Session::new();
        session.set_api_key("key");

        let err = dispatcher
            .send(
                Some(&session),
                ApiRequest::post("/datastores/v1/entry")
                    .auth(AuthMode::ApiKey)
                    .scope("universe-datastores.objects:create"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientScope);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_silence_errors_returns_raw_response() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::text(404, "missing"));

        let response = dispatcher
            .send(None, ApiRequest::get("/v1/x").silence_errors())
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, "missing");
    }

    #[tokio::test]
    async fn test_send_json_decodes_and_sets_content_type() {
        let (dispatcher, transport) = dispatcher();
        transport.push(MockResponse::json(200, serde_json::json!({ "name": "Builderman" })));

        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }
        let named: Named = dispatcher
            .send_json(None, ApiRequest::post("/v1/x").json_value(serde_json::json!({ "a": 1 })))
            .await
            .unwrap();

        assert_eq!(named.name, "Builderman");
        let sent = &transport.requests()[0];
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert_eq!(sent.body.as_deref(), Some(r#"{"a":1}"#));
    }
}
