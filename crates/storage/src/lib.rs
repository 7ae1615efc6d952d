//! Storage abstractions for route map services.
//!
//! Provides unified interfaces for:
//! - Object storage (MinIO/S3, local directory, in-memory) for rendered images
//! - Redis or in-process caches for rendered variants
//! - Existence flags recording which variants are persisted

pub mod cache;
pub mod flags;
pub mod memory_cache;
pub mod object_store;
pub mod variant_cache;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, StoragePath};
pub use cache::{CacheStore, RedisCache};
pub use flags::{FlagStore, MemoryFlagStore, RedisFlagStore};
pub use memory_cache::{MemoryCache, MemoryCacheSnapshot};
pub use variant_cache::{fingerprint, VariantCache, VariantKey, VARIANT_TTL};
