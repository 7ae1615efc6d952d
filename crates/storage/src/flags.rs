//! Existence flags: which artifacts of a subject are persisted in blob storage.
//!
//! Flags are only set after the blob write succeeded. A reset clears them
//! without touching the blobs, so a reader may briefly see stale bytes in
//! the store after a clear.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

use route_common::{Artifact, ExistenceFlags, RouteError, RouteResult};

use crate::cache::RedisCache;

#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Current flags of `subject`; unknown subjects have every flag false.
    async fn get(&self, subject: &str) -> RouteResult<ExistenceFlags>;

    async fn set(&self, subject: &str, artifact: Artifact, present: bool) -> RouteResult<()>;

    /// Set every flag of `subject` to false.
    async fn reset(&self, subject: &str) -> RouteResult<()>;
}

/// Process-local flag store.
#[derive(Clone, Default)]
pub struct MemoryFlagStore {
    flags: Arc<RwLock<HashMap<String, ExistenceFlags>>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, subject: &str) -> RouteResult<ExistenceFlags> {
        let flags = self.flags.read().await;
        Ok(flags.get(subject).copied().unwrap_or_default())
    }

    async fn set(&self, subject: &str, artifact: Artifact, present: bool) -> RouteResult<()> {
        let mut flags = self.flags.write().await;
        flags
            .entry(subject.to_string())
            .or_default()
            .set(artifact, present);
        Ok(())
    }

    async fn reset(&self, subject: &str) -> RouteResult<()> {
        let mut flags = self.flags.write().await;
        flags.remove(subject);
        Ok(())
    }
}

/// Flags kept in one Redis hash per subject, one field per artifact.
#[derive(Clone)]
pub struct RedisFlagStore {
    cache: RedisCache,
}

impl RedisFlagStore {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    fn hash_key(subject: &str) -> String {
        format!("routeflags:{}", subject)
    }
}

#[async_trait]
impl FlagStore for RedisFlagStore {
    async fn get(&self, subject: &str) -> RouteResult<ExistenceFlags> {
        let mut conn = self.cache.connection();
        let fields: HashMap<String, u8> = conn
            .hgetall(Self::hash_key(subject))
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Flag read failed: {}", e)))?;

        let mut flags = ExistenceFlags::default();
        for artifact in Artifact::ALL {
            let present = fields.get(artifact.discriminator()).copied().unwrap_or(0) == 1;
            flags.set(artifact, present);
        }
        Ok(flags)
    }

    #[instrument(skip(self))]
    async fn set(&self, subject: &str, artifact: Artifact, present: bool) -> RouteResult<()> {
        let mut conn = self.cache.connection();
        conn.hset::<_, _, _, ()>(
            Self::hash_key(subject),
            artifact.discriminator(),
            u8::from(present),
        )
        .await
        .map_err(|e| RouteError::CacheFailure(format!("Flag write failed: {}", e)))
    }

    #[instrument(skip(self))]
    async fn reset(&self, subject: &str) -> RouteResult<()> {
        let mut conn = self.cache.connection();
        conn.del::<_, ()>(Self::hash_key(subject))
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Flag reset failed: {}", e)))
    }
}
