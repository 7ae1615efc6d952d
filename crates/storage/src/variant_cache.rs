//! Content-addressed cache of rendered variants.
//!
//! Keys are `routemap:{subject}:{discriminator}:{fingerprint}`. The subject
//! is the route id (or the raster id for thumbnails), the discriminator names
//! the artifact, and the fingerprint hashes every input that changes the
//! rendered pixels. Replacing a raster or a track therefore produces a new
//! key even before the old entries are invalidated.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use route_common::{Artifact, RouteResult};

use crate::cache::CacheStore;

const KEY_NAMESPACE: &str = "routemap";

/// Default lifetime of a rendered variant.
pub const VARIANT_TTL: Duration = Duration::from_secs(31 * 24 * 60 * 60);

/// Cache key for one artifact of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub subject: String,
    pub artifact: Artifact,
    pub fingerprint: String,
}

impl VariantKey {
    pub fn new(subject: impl Into<String>, artifact: Artifact, fingerprint: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            artifact,
            fingerprint: fingerprint.into(),
        }
    }

    /// Prefix shared by every key of `subject`.
    pub fn subject_prefix(subject: &str) -> String {
        format!("{}:{}:", KEY_NAMESPACE, subject)
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            KEY_NAMESPACE,
            self.subject,
            self.artifact.discriminator(),
            self.fingerprint
        )
    }
}

/// First 16 hex characters of SHA-256 over the given parts.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Variant cache over any [`CacheStore`].
///
/// Concurrent misses on the same key may both render; the last `put` wins.
#[derive(Clone)]
pub struct VariantCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl VariantCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: VARIANT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn get(&self, key: &VariantKey) -> RouteResult<Option<Bytes>> {
        let hit = self.store.get(&key.to_string()).await?;
        debug!(hit = hit.is_some(), "Variant cache lookup");
        Ok(hit)
    }

    /// Store rendered bytes, overwriting any previous entry.
    pub async fn put(&self, key: &VariantKey, data: Bytes) -> RouteResult<()> {
        self.put_with_ttl(key, data, self.ttl).await
    }

    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    pub async fn put_with_ttl(&self, key: &VariantKey, data: Bytes, ttl: Duration) -> RouteResult<()> {
        self.store.set(&key.to_string(), data, ttl).await
    }

    /// Drop every cached artifact of `subject`. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, subject: &str) -> RouteResult<u64> {
        let removed = self
            .store
            .delete_prefix(&VariantKey::subject_prefix(subject))
            .await?;
        debug!(removed, "Invalidated subject");
        Ok(removed)
    }
}
