//! services/api/src/adapters/redis_store.rs
//!
//! Redis implementation of the `CacheService` and `SessionStore` ports. Entity cache
//! entries and sessions share one instance but live under separate key prefixes.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use marketplace_core::domain::{AuthSession, PrincipalKind};
use marketplace_core::ports::{CacheService, PortError, PortResult, SessionStore};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const SESSION_PREFIX: &str = "session:";

fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct RedisAdapter {
    pool: Pool,
}

impl RedisAdapter {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `url` and checks that one connection can be opened.
    pub async fn connect(url: &str) -> PortResult<Self> {
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let adapter = Self::new(pool);
        adapter.conn().await?;
        Ok(adapter)
    }

    async fn conn(&self) -> PortResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to get Redis connection: {}", e)))
    }
}

fn redis_err(e: redis::RedisError) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `CacheService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CacheService for RedisAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await.map_err(redis_err)?;
        debug!(key = %key, hit = value.is_some(), "cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> PortResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(redis_err)
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(redis_err)
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for RedisAdapter {
    async fn create_session(
        &self,
        principal_id: Uuid,
        principal_kind: PrincipalKind,
        ttl: Duration,
    ) -> PortResult<AuthSession> {
        let expires_in = chrono::Duration::from_std(ttl)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let session = AuthSession {
            session_id: Uuid::new_v4().to_string(),
            principal_id,
            principal_kind,
            expires_at: Utc::now() + expires_in,
        };
        let payload =
            serde_json::to_string(&session).map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(session_key(&session.session_id), payload, ttl.as_secs().max(1))
            .await
            .map_err(redis_err)?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(session_key(session_id)).await.map_err(redis_err)?;
        let payload = payload
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        serde_json::from_str(&payload).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn delete_session(&self, session_id: &str) -> PortResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(session_key(session_id))
            .await
            .map_err(redis_err)
    }
}
