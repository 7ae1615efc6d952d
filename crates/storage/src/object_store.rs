//! Object storage for rendered map images (MinIO/S3 compatible).

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use route_common::{RenderVariant, RouteError, RouteResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "route-maps".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
        }
    }
}

/// Object storage client for map images.
///
/// Every backend makes a `put` visible atomically: readers see either the
/// previous object or the complete new one.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new S3 object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> RouteResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| RouteError::StoreFailure(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Store objects under a local directory (writes go through a temp file and rename).
    pub fn local(root: impl AsRef<std::path::Path>) -> RouteResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
            RouteError::StoreFailure(format!("Failed to open {}: {}", root.display(), e))
        })?;

        Ok(Self {
            store: Arc::new(store),
            bucket: root.display().to_string(),
        })
    }

    /// Process-local store, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: "memory".to_string(),
        }
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> RouteResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| RouteError::StoreFailure(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> RouteResult<Bytes> {
        let location = Path::from(path);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => RouteError::NotFound(path.to_string()),
            e => RouteError::StoreFailure(format!("Failed to read {}: {}", path, e)),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| RouteError::StoreFailure(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Read bytes from a path, mapping a missing object to `None`.
    pub async fn get_opt(&self, path: &str) -> RouteResult<Option<Bytes>> {
        match self.get(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(RouteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> RouteResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(RouteError::StoreFailure(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List objects with a given prefix.
    pub async fn list(&self, prefix: &str) -> RouteResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| RouteError::StoreFailure(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }

    /// Delete an object. Deleting a missing object succeeds.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> RouteResult<()> {
        let location = Path::from(path);

        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(RouteError::StoreFailure(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    /// Base path for a route's rendered images.
    /// Format: routes/{route_id}/{raster_id}
    pub fn route_images(route_id: &str, raster_id: &str) -> String {
        format!("routes/{}/{}", route_id, raster_id)
    }

    /// Build path for a rendered variant.
    /// Format: routes/{route_id}/{raster_id}{suffix}
    pub fn variant(route_id: &str, raster_id: &str, variant: RenderVariant) -> String {
        format!(
            "{}{}",
            Self::route_images(route_id, raster_id),
            variant.blob_suffix()
        )
    }

    /// Build path for a raster thumbnail.
    /// Format: maps/{raster_id}_thumb
    pub fn thumbnail(raster_id: &str) -> String {
        format!("maps/{}_thumb", raster_id)
    }

    /// Every variant path a route may have written, including the unsuffixed
    /// path used by earlier layouts.
    pub fn all_route_paths(route_id: &str, raster_id: &str) -> Vec<String> {
        let mut paths = vec![Self::route_images(route_id, raster_id)];
        paths.extend(
            RenderVariant::ALL
                .iter()
                .map(|v| Self::variant(route_id, raster_id, *v)),
        );
        paths
    }
}
