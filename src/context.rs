use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::entity::{Entity, FromId};
use crate::error::Result;
use crate::http::{ApiRequest, HttpDispatcher, RawResponse};
use crate::lazy::LazyRef;
use crate::pool::{EntityPool, EntityRegistry};
use crate::session::Session;

/// Everything the entity layer needs to talk to the web APIs.
///
/// Built once at the composition root and passed by reference. Cloning is
/// cheap and shares the dispatcher and the entity pools.
#[derive(Clone)]
pub struct ApiContext {
    dispatcher: Arc<HttpDispatcher>,
    entities: EntityRegistry,
    default_session: Option<Arc<Session>>,
}

impl ApiContext {
    pub fn new(dispatcher: Arc<HttpDispatcher>) -> Self {
        Self {
            dispatcher,
            entities: EntityRegistry::new(),
            default_session: None,
        }
    }

    /// Use `entities` instead of a fresh registry, e.g. to share pools between contexts.
    pub fn with_registry(mut self, entities: EntityRegistry) -> Self {
        self.entities = entities;
        self
    }

    /// The session used by calls that don't name one.
    pub fn with_default_session(mut self, session: Arc<Session>) -> Self {
        self.default_session = Some(session);
        self
    }

    pub fn dispatcher(&self) -> &HttpDispatcher {
        &self.dispatcher
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn default_session(&self) -> Option<Arc<Session>> {
        self.default_session.clone()
    }

    /// `session` if given, else the default session.
    pub fn effective_session(&self, session: Option<&Arc<Session>>) -> Option<Arc<Session>> {
        session.cloned().or_else(|| self.default_session())
    }

    pub fn pool<T: Entity>(&self) -> Arc<EntityPool<T>> {
        self.entities.pool::<T>()
    }

    /// An unresolved reference that captures the default session.
    pub fn lazy<T: FromId>(&self, id: u64) -> LazyRef<T> {
        LazyRef::new(id, self.default_session())
    }

    pub async fn send(
        &self,
        session: Option<&Arc<Session>>,
        request: ApiRequest,
    ) -> Result<RawResponse> {
        let session = self.effective_session(session);
        self.dispatcher.send(session.as_deref(), request).await
    }

    pub async fn send_string(
        &self,
        session: Option<&Arc<Session>>,
        request: ApiRequest,
    ) -> Result<String> {
        let session = self.effective_session(session);
        self.dispatcher.send_string(session.as_deref(), request).await
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        session: Option<&Arc<Session>>,
        request: ApiRequest,
    ) -> Result<T> {
        let session = self.effective_session(session);
        self.dispatcher.send_json(session.as_deref(), request).await
    }
}
