#![allow(dead_code)]

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rbxweb::http::mock::{MockResponse, MockTransport};
use rbxweb::{
    ApiContext, ApiRequest, AuthMode, ClientConfig, Entity, FromId, HttpDispatcher, Refresh,
    RbxError, Result, Session, SessionSlot,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails {
    id: u64,
    name: String,
    display_name: String,
}

/// Minimal entity standing in for the real entity layer.
#[derive(Debug)]
pub struct User {
    id: u64,
    pub name: String,
    display_name: RwLock<String>,
    session: SessionSlot,
}

impl User {
    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn set_display_name(&self, ctx: &ApiContext, display_name: &str) -> Result<()> {
        let request = ApiRequest::patch(format!("/v1/users/{}/display-names", self.id))
            .subdomain("users")
            .auth(AuthMode::Cookie)
            .json(&serde_json::json!({ "newDisplayName": display_name }))?;
        ctx.send(self.session().as_ref(), request).await?;
        *self
            .display_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = display_name.to_string();
        Ok(())
    }

    async fn fetch(
        ctx: &ApiContext,
        id: u64,
        session: Option<&Arc<Session>>,
    ) -> Result<UserDetails> {
        let request = ApiRequest::get(format!("/v1/users/{id}")).subdomain("users");
        ctx.send_json(session, request).await
    }
}

impl Entity for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn session_slot(&self) -> &SessionSlot {
        &self.session
    }
}

#[async_trait]
impl FromId for User {
    async fn from_id(
        ctx: &ApiContext,
        id: u64,
        session: Option<Arc<Session>>,
    ) -> Result<Arc<Self>> {
        let fetch_session = session.clone();
        ctx.pool::<User>()
            .get_or_try_insert_with(id, session, || async move {
                let details = User::fetch(ctx, id, fetch_session.as_ref()).await?;
                Ok::<_, RbxError>(User {
                    id: details.id,
                    name: details.name,
                    display_name: RwLock::new(details.display_name),
                    session: SessionSlot::default(),
                })
            })
            .await
    }
}

#[async_trait]
impl Refresh for User {
    async fn refresh(&self, ctx: &ApiContext) -> Result<()> {
        let details = User::fetch(ctx, self.id, self.session().as_ref()).await?;
        *self
            .display_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = details.display_name;
        Ok(())
    }
}

pub fn context() -> (ApiContext, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let dispatcher = HttpDispatcher::with_transport(ClientConfig::default(), transport.clone());
    (ApiContext::new(Arc::new(dispatcher)), transport)
}

pub fn user_response(id: u64, display_name: &str) -> MockResponse {
    MockResponse::json(
        200,
        serde_json::json!({
            "id": id,
            "name": format!("user{id}"),
            "displayName": display_name,
            "description": "",
            "isBanned": false
        }),
    )
}

pub fn who_am_i(id: u64, name: &str) -> MockResponse {
    MockResponse::json(
        200,
        serde_json::json!({ "id": id, "name": name, "displayName": name }),
    )
}
