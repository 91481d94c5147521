//! Contracts the entity layer implements so the pool and
//! [`LazyRef`](crate::lazy::LazyRef) can work with it.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::warn;

use crate::context::ApiContext;
use crate::error::Result;
use crate::session::Session;

/// Interior-mutable holder for the session an entity acts through.
///
/// Pooled entities are shared, so attaching a session must work through `&self`.
#[derive(Debug, Default)]
pub struct SessionSlot(RwLock<Option<Arc<Session>>>);

impl SessionSlot {
    pub fn new(session: Option<Arc<Session>>) -> Self {
        Self(RwLock::new(session))
    }

    pub fn get(&self) -> Option<Arc<Session>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, session: Arc<Session>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A remote object identified by a numeric id.
pub trait Entity: Send + Sync + 'static {
    fn id(&self) -> u64;

    fn session_slot(&self) -> &SessionSlot;

    fn session(&self) -> Option<Arc<Session>> {
        self.session_slot().get()
    }

    fn attach_session(&self, session: Arc<Session>) {
        self.session_slot().set(session);
    }

    fn detach_session(&self) {
        self.session_slot().clear();
    }
}

/// Re-fetch an entity's state from the remote API. Never called automatically.
#[async_trait]
pub trait Refresh: Entity {
    async fn refresh(&self, ctx: &ApiContext) -> Result<()>;
}

/// Factory that fetches an entity by id.
///
/// Implementations should check the pool first and register what they fetch,
/// usually through [`get_or_try_insert_with`].
///
/// [`get_or_try_insert_with`]: crate::pool::EntityPool::get_or_try_insert_with
#[async_trait]
pub trait FromId: Entity + Sized {
    async fn from_id(
        ctx: &ApiContext,
        id: u64,
        session: Option<Arc<Session>>,
    ) -> Result<Arc<Self>>;
}

/// Attach `session` and refresh the entity through it.
///
/// A failed refresh is logged and returned; the session stays attached so the
/// caller can retry.
pub async fn attach_and_refresh<T: Refresh>(
    entity: &T,
    ctx: &ApiContext,
    session: Arc<Session>,
) -> Result<()> {
    entity.attach_session(session);
    if let Err(err) = entity.refresh(ctx).await {
        warn!(entity_id = entity.id(), error = %err, "refresh after attaching a session failed");
        return Err(err);
    }
    Ok(())
}
