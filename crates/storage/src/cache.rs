//! Key/value cache stores with TTL support.
//!
//! [`CacheStore`] is the seam between the variant cache and its backend:
//! [`RedisCache`] shares entries across a cluster, [`crate::MemoryCache`]
//! keeps them in-process.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, instrument};

use route_common::{RouteError, RouteResult};

/// Simple keyed byte store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an entry; expired or missing entries are `None`.
    async fn get(&self, key: &str) -> RouteResult<Option<Bytes>>;

    /// Store an entry, replacing any previous value under `key`.
    async fn set(&self, key: &str, data: Bytes, ttl: Duration) -> RouteResult<()>;

    /// Remove one entry. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> RouteResult<()>;

    /// Remove every entry whose key starts with `prefix`. Returns the count removed.
    async fn delete_prefix(&self, prefix: &str) -> RouteResult<u64>;
}

/// Redis cache client.
///
/// The multiplexed connection is cheap to clone, so every call works on its
/// own handle and the cache can be shared behind `&self`.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> RouteResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| RouteError::CacheFailure(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Redis connection failed: {}", e)))?;

        Ok(Self { conn })
    }

    pub(crate) fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> RouteResult<Option<Bytes>> {
        let mut conn = self.connection();
        let result: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Cache get failed: {}", e)))?;

        Ok(result.map(Bytes::from))
    }

    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn set(&self, key: &str, data: Bytes, ttl: Duration) -> RouteResult<()> {
        let mut conn = self.connection();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(key, data.as_ref(), seconds)
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Cache set failed: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> RouteResult<()> {
        let mut conn = self.connection();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Cache delete failed: {}", e)))?;

        Ok(())
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn delete_prefix(&self, prefix: &str) -> RouteResult<u64> {
        let mut conn = self.connection();
        let pattern = format!("{}*", escape_glob(prefix));

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Pattern search failed: {}", e)))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count: u64 = conn
            .del(&keys)
            .await
            .map_err(|e| RouteError::CacheFailure(format!("Delete failed: {}", e)))?;

        debug!(count, "Deleted cache keys");
        Ok(count)
    }
}

/// Escape Redis glob metacharacters so a key prefix matches literally.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
