use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::entity::Entity;
use crate::error::Result;
use crate::session::Session;

/// One shared instance per remote id for a single entity type.
///
/// The first instance registered for an id wins; later registrations for the
/// same id get the existing instance back.
pub struct EntityPool<T: Entity> {
    entries: DashMap<u64, Arc<T>>,
}

impl<T: Entity> Default for EntityPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityPool<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// The pooled instance for `id`, with `session` attached to it when given.
    pub fn get(&self, id: u64, session: Option<Arc<Session>>) -> Option<Arc<T>> {
        // Clone out so the shard lock is released before touching the entity.
        let entity = self.entries.get(&id).map(|e| e.value().clone())?;
        if let Some(session) = session {
            entity.attach_session(session);
        }
        Some(entity)
    }

    /// Register `instance` unless its id is already taken. Returns the pooled instance.
    pub fn add(&self, instance: Arc<T>) -> Arc<T> {
        let id = instance.id();
        let pooled = self.entries.entry(id).or_insert(instance.clone()).value().clone();
        if !Arc::ptr_eq(&pooled, &instance) {
            debug!(
                id,
                entity = std::any::type_name::<T>(),
                "already pooled, keeping first instance"
            );
        }
        pooled
    }

    /// Return the pooled instance, or run `fetch` and register its result.
    ///
    /// Two callers racing on the same id may both fetch; both end up with the
    /// instance that was registered first.
    pub async fn get_or_try_insert_with<F, Fut>(
        &self,
        id: u64,
        session: Option<Arc<Session>>,
        fetch: F,
    ) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(existing) = self.get(id, session.clone()) {
            return Ok(existing);
        }
        let fetched = fetch().await?;
        let pooled = self.add(Arc::new(fetched));
        if let Some(session) = session {
            pooled.attach_session(session);
        }
        Ok(pooled)
    }

    pub fn remove(&self, id: u64) -> Option<Arc<T>> {
        self.entries.remove(&id).map(|(_, entity)| entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Per-process set of entity pools, one per entity type.
///
/// Cloning shares the same pools. Build one per composition root (or per test)
/// and pass it around instead of reaching for global state.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    pools: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool<T: Entity>(&self) -> Arc<EntityPool<T>> {
        let erased = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(EntityPool::<T>::new()) as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();
        match erased.downcast::<EntityPool<T>>() {
            Ok(pool) => pool,
            // Keyed by `TypeId::of::<T>()`, so the stored pool is always `EntityPool<T>`.
            Err(_) => unreachable!("entity pool registered under the wrong type"),
        }
    }

    /// Number of entity types with a pool.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Drop every pool. Instances already handed out stay alive.
    pub fn clear(&self) {
        self.pools.clear();
    }
}
