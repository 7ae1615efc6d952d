//! Worker configuration.
//!
//! Loaded from a YAML file when one is given, otherwise from environment
//! variables. Every client the worker uses is built from here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use geodesy::{BoundaryIndex, Gazetteer, NoGazetteer};
use renderer::RendererConfig;
use storage::{
    CacheStore, FlagStore, MemoryCache, MemoryFlagStore, ObjectStorage, ObjectStorageConfig,
    RedisCache, RedisFlagStore, VariantCache,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    S3,
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

fn parse_backend<T: for<'de> Deserialize<'de>>(name: &str, value: &str) -> Result<T> {
    serde_yaml::from_str(&value.to_lowercase())
        .with_context(|| format!("{} has unknown value '{}'", name, value))
}

/// Variant cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Upper bound for the in-process cache
    pub memory_limit_mb: usize,
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: "redis://redis:6379".to_string(),
            memory_limit_mb: 256,
            ttl_days: 31,
        }
    }
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

impl CacheConfig {
    pub fn ttl(&self) -> Result<Duration> {
        self.ttl_days
            .checked_mul(SECS_PER_DAY)
            .map(Duration::from_secs)
            .with_context(|| format!("cache ttl of {} days is out of range", self.ttl_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub blob_backend: BlobBackend,
    /// Used when `blob_backend` is `s3`
    pub storage: ObjectStorageConfig,
    /// Used when `blob_backend` is `local`
    pub local_blob_dir: PathBuf,
    pub cache: CacheConfig,
    pub renderer: RendererConfig,
    /// Boundary dataset for timezone lookups; without one every route is UTC
    pub gazetteer_path: Option<PathBuf>,
    pub warm_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            blob_backend: BlobBackend::Local,
            storage: ObjectStorageConfig::default(),
            local_blob_dir: PathBuf::from("data/blobs"),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            gazetteer_path: None,
            warm_concurrency: 4,
        }
    }
}

impl WorkerConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an environment-like lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("BLOB_BACKEND") {
            config.blob_backend = parse_backend("BLOB_BACKEND", &v)?;
        }
        if let Some(v) = lookup("LOCAL_BLOB_DIR") {
            config.local_blob_dir = PathBuf::from(v);
        }

        let storage = &mut config.storage;
        if let Some(v) = lookup("S3_ENDPOINT") {
            storage.endpoint = v;
        }
        if let Some(v) = lookup("S3_BUCKET") {
            storage.bucket = v;
        }
        if let Some(v) = lookup("S3_ACCESS_KEY") {
            storage.access_key_id = v;
        }
        if let Some(v) = lookup("S3_SECRET_KEY") {
            storage.secret_access_key = v;
        }
        if let Some(v) = lookup("S3_REGION") {
            storage.region = v;
        }
        if let Some(v) = lookup("S3_ALLOW_HTTP") {
            storage.allow_http = v == "true";
        }

        if let Some(v) = lookup("CACHE_BACKEND") {
            config.cache.backend = parse_backend("CACHE_BACKEND", &v)?;
        }
        if let Some(v) = lookup("REDIS_URL") {
            config.cache.redis_url = v;
        }
        if let Some(v) = lookup("CACHE_MEMORY_MB") {
            config.cache.memory_limit_mb = v.parse().context("CACHE_MEMORY_MB must be an integer")?;
        }
        if let Some(v) = lookup("CACHE_TTL_DAYS") {
            config.cache.ttl_days = v.parse().context("CACHE_TTL_DAYS must be an integer")?;
        }

        if let Some(v) = lookup("RENDERER_PROGRAM") {
            config.renderer.program = v;
        }
        if let Some(v) = lookup("RENDERER_SCRIPT") {
            config.renderer.script = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup("RENDERER_TIMEOUT_SECS") {
            config.renderer.timeout_secs = v
                .parse()
                .context("RENDERER_TIMEOUT_SECS must be an integer")?;
        }

        config.gazetteer_path = lookup("GAZETTEER_PATH").map(PathBuf::from);
        if let Some(v) = lookup("WARM_CONCURRENCY") {
            config.warm_concurrency = v.parse().context("WARM_CONCURRENCY must be an integer")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.renderer.timeout_secs == 0 {
            bail!("renderer timeout must be at least one second");
        }
        if self.warm_concurrency == 0 {
            bail!("warm concurrency must be at least 1");
        }
        self.cache.ttl()?;
        Ok(())
    }

    pub fn blob_store(&self) -> Result<ObjectStorage> {
        let store = match self.blob_backend {
            BlobBackend::S3 => ObjectStorage::new(&self.storage)?,
            BlobBackend::Local => ObjectStorage::local(&self.local_blob_dir)?,
            BlobBackend::Memory => ObjectStorage::in_memory(),
        };
        info!(backend = ?self.blob_backend, bucket = %store.bucket(), "Blob store ready");
        Ok(store)
    }

    /// Variant cache and flag store; both live in the same backend.
    pub async fn cache_and_flags(&self) -> Result<(VariantCache, Arc<dyn FlagStore>)> {
        let (store, flags) = match self.cache.backend {
            CacheBackend::Memory => {
                let store: Arc<dyn CacheStore> =
                    Arc::new(MemoryCache::new(self.cache.memory_limit_mb));
                let flags: Arc<dyn FlagStore> = Arc::new(MemoryFlagStore::new());
                (store, flags)
            }
            CacheBackend::Redis => {
                let redis = RedisCache::connect(&self.cache.redis_url)
                    .await
                    .context("Failed to connect to Redis")?;
                let flags: Arc<dyn FlagStore> = Arc::new(RedisFlagStore::new(redis.clone()));
                let store: Arc<dyn CacheStore> = Arc::new(redis);
                (store, flags)
            }
        };
        let ttl = self.cache.ttl()?;
        info!(backend = ?self.cache.backend, ttl_days = self.cache.ttl_days, "Variant cache ready");
        Ok((VariantCache::new(store).with_ttl(ttl), flags))
    }

    pub fn gazetteer(&self) -> Result<Arc<dyn Gazetteer>> {
        match &self.gazetteer_path {
            Some(path) => {
                let index = BoundaryIndex::load(path)
                    .with_context(|| format!("Failed to load gazetteer {}", path.display()))?;
                Ok(Arc::new(index))
            }
            None => Ok(Arc::new(NoGazetteer)),
        }
    }
}
