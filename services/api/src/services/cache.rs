//! services/api/src/services/cache.rs
//!
//! A typed, best-effort view over the `CacheService` port for one entity namespace.

use marketplace_core::{CacheService, PortResult, ServiceError};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::store_err;

/// Read-through cache for entities of type `T` under `<prefix>:<uuid>` keys.
///
/// Cache failures never reach the caller: a failed read is a miss and a failed
/// write or delete is logged and dropped.
pub struct EntityCache<T> {
    cache: Arc<dyn CacheService>,
    prefix: &'static str,
    ttl: Duration,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            prefix: self.prefix,
            ttl: self.ttl,
            _entity: PhantomData,
        }
    }
}

impl<T> EntityCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache: Arc<dyn CacheService>, prefix: &'static str, ttl: Duration) -> Self {
        Self {
            cache,
            prefix,
            ttl,
            _entity: PhantomData,
        }
    }

    pub fn key(&self, id: Uuid) -> String {
        format!("{}:{}", self.prefix, id)
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        let key = self.key(id);
        let raw = match self.cache.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, falling back to store");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set(&self, id: Uuid, entity: &T) {
        let key = self.key(id);
        let raw = match serde_json::to_string(entity) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set(&key, raw, self.ttl).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }

    pub async fn delete(&self, id: Uuid) {
        let key = self.key(id);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "cache delete failed");
        }
    }

    /// Returns the cached entity, or loads it with `load` and caches the result.
    /// A store miss becomes `ServiceError::NotFound(entity)`.
    pub async fn find_through<F, Fut>(
        &self,
        id: Uuid,
        entity: &'static str,
        load: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        if let Some(hit) = self.get(id).await {
            debug!(key = %self.key(id), "cache hit");
            return Ok(hit);
        }
        let row = load().await.map_err(store_err(entity))?;
        self.set(id, &row).await;
        Ok(row)
    }
}
