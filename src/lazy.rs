use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::context::ApiContext;
use crate::entity::{Entity, FromId};
use crate::error::{RbxError, Result};
use crate::session::Session;

/// A reference to a remote entity by id, fetched on first use.
///
/// List endpoints hand these out instead of full entities so that nothing is
/// fetched until a caller asks for it. The first successful [`resolve`](Self::resolve)
/// is memoized; a failed one is not, and the next call tries again.
pub struct LazyRef<T: FromId> {
    id: u64,
    session: Option<Arc<Session>>,
    resolved: OnceCell<Arc<T>>,
}

impl<T: FromId> LazyRef<T> {
    pub fn new(id: u64, session: Option<Arc<Session>>) -> Self {
        Self {
            id,
            session,
            resolved: OnceCell::new(),
        }
    }

    /// One unresolved reference per id, all sharing `session`.
    pub fn many(ids: impl IntoIterator<Item = u64>, session: Option<Arc<Session>>) -> Vec<Self> {
        ids.into_iter()
            .map(|id| Self::new(id, session.clone()))
            .collect()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// The resolved entity, if [`resolve`](Self::resolve) already succeeded.
    pub fn get(&self) -> Option<&Arc<T>> {
        self.resolved.get()
    }

    /// Resolve with the captured session, else the context's default session.
    pub async fn resolve(&self, ctx: &ApiContext) -> Result<Arc<T>> {
        self.resolve_with(ctx, None).await
    }

    /// Resolve, preferring `session` over the captured one on the first call.
    ///
    /// Once resolved, later calls return the same instance without any I/O,
    /// whatever session they pass.
    pub async fn resolve_with(
        &self,
        ctx: &ApiContext,
        session: Option<Arc<Session>>,
    ) -> Result<Arc<T>> {
        let entity = self
            .resolved
            .get_or_try_init(|| async {
                let session = session
                    .or_else(|| self.session.clone())
                    .or_else(|| ctx.default_session());
                let pool = ctx.pool::<T>();
                if let Some(pooled) = pool.get(self.id, session.clone()) {
                    return Ok::<_, RbxError>(pooled);
                }
                let fetched = T::from_id(ctx, self.id, session.clone()).await?;
                // Factories register themselves; this keeps the pool authoritative if one didn't.
                let pooled = pool.add(fetched);
                if let Some(session) = session {
                    pooled.attach_session(session);
                }
                Ok::<_, RbxError>(pooled)
            })
            .await?;
        Ok(entity.clone())
    }
}

impl<T: FromId> Clone for LazyRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            session: self.session.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl<T: FromId> fmt::Debug for LazyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRef")
            .field("type", &std::any::type_name::<T>())
            .field("id", &self.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
