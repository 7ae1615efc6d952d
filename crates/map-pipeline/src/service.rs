//! Render orchestration: variant lookups that render on a miss.
//!
//! Per (subject, artifact) the lifecycle is `Unrendered -> Rendering ->
//! Persisted`. A [`ClearMode::CacheOnly`] clear moves it back to
//! `Unrendered` while the blob stays in storage, so readers going straight
//! to the blob store may see stale bytes until the next render or purge.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn, Instrument};

use geodesy::{Gazetteer, NoGazetteer};
use renderer::{generate_thumbnail, MapRenderer, RenderRequest};
use route_common::{
    Artifact, ExistenceFlags, GeoReferencedRaster, RenderVariant, RouteError, RouteResult, Track,
};
use storage::{fingerprint, FlagStore, ObjectStorage, StoragePath, VariantCache, VariantKey};

use crate::source::{RasterRecord, RouteRecord, RouteSource};
use crate::stats::{PipelineStats, StatsSnapshot};

/// How far a clear reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearMode {
    /// Drop cache entries and reset flags; stored blobs stay.
    CacheOnly,
    /// Also delete the stored blobs.
    CacheAndStore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub cache_entries: u64,
    pub blobs_deleted: usize,
}

/// Answers "variant V of route R", rendering and persisting on a miss.
///
/// Cheap to clone; clones share every collaborator.
#[derive(Clone)]
pub struct MapService {
    pub(crate) routes: Arc<dyn RouteSource>,
    renderer: Arc<dyn MapRenderer>,
    cache: VariantCache,
    blobs: ObjectStorage,
    pub(crate) flags: Arc<dyn FlagStore>,
    pub(crate) gazetteer: Arc<dyn Gazetteer>,
    stats: Arc<PipelineStats>,
}

impl MapService {
    pub fn new(
        routes: Arc<dyn RouteSource>,
        renderer: Arc<dyn MapRenderer>,
        cache: VariantCache,
        blobs: ObjectStorage,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        Self {
            routes,
            renderer,
            cache,
            blobs,
            flags,
            gazetteer: Arc::new(NoGazetteer),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn with_gazetteer(mut self, gazetteer: Arc<dyn Gazetteer>) -> Self {
        self.gazetteer = gazetteer;
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Cache key of a route variant.
    ///
    /// The fingerprint covers the raster content, the track and the
    /// timezone, everything the renderer draws from.
    pub fn variant_key(record: &RouteRecord, raster: &RasterRecord, variant: RenderVariant) -> RouteResult<VariantKey> {
        let track_json = record.track.to_json()?;
        Ok(VariantKey::new(
            record.id.as_str(),
            variant.into(),
            fingerprint([
                raster.content_hash.as_str(),
                track_json.as_str(),
                record.timezone.as_str(),
            ]),
        ))
    }

    pub fn thumbnail_key(raster: &RasterRecord) -> VariantKey {
        VariantKey::new(
            raster.id.as_str(),
            Artifact::Thumbnail,
            fingerprint([raster.content_hash.as_str()]),
        )
    }

    /// Bytes of `variant` for `route_id`, rendered if not cached.
    ///
    /// Once a render has started it runs to completion and is persisted
    /// even if the caller stops waiting.
    #[instrument(skip(self), fields(route = %route_id, variant = %variant))]
    pub async fn get_variant(&self, route_id: &str, variant: RenderVariant) -> RouteResult<Bytes> {
        let record = self.routes.route(route_id).await?;
        let raster = record.raster.clone().ok_or_else(|| {
            RouteError::NotFound(format!("route {} has no raster map", route_id))
        })?;

        let key = Self::variant_key(&record, &raster, variant)?;
        if let Some(bytes) = self.cached(&key).await {
            return Ok(bytes);
        }

        let service = self.clone();
        let task = tokio::spawn(
            async move { service.render_variant(record, raster, variant, key).await }
                .in_current_span(),
        );
        task.await
            .map_err(|e| RouteError::Internal(format!("render task failed: {}", e)))?
    }

    /// JPEG thumbnail of a raster, generated if not cached.
    #[instrument(skip(self), fields(raster = %raster_id))]
    pub async fn get_thumbnail(&self, raster_id: &str) -> RouteResult<Bytes> {
        let raster = self.routes.raster(raster_id).await?;
        let key = Self::thumbnail_key(&raster);
        if let Some(bytes) = self.cached(&key).await {
            return Ok(bytes);
        }

        let service = self.clone();
        let task = tokio::spawn(
            async move { service.render_thumbnail(raster, key).await }.in_current_span(),
        );
        task.await
            .map_err(|e| RouteError::Internal(format!("thumbnail task failed: {}", e)))?
    }

    /// Existence flags of a route, with the thumbnail flag of its raster.
    pub async fn flags(&self, route_id: &str) -> RouteResult<ExistenceFlags> {
        let record = self.routes.route(route_id).await?;
        let mut flags = self.flags.get(route_id).await?;

        let has_thumbnail = match &record.raster {
            Some(raster) => self.flags.get(&raster.id).await?.has_thumbnail,
            None => false,
        };
        flags.set(Artifact::Thumbnail, has_thumbnail);
        Ok(flags)
    }

    /// Drop cached variants and reset the flags of a route.
    #[instrument(skip(self), fields(route = %route_id))]
    pub async fn clear(&self, route_id: &str, mode: ClearMode) -> RouteResult<ClearReport> {
        let cache_entries = self.cache.invalidate(route_id).await?;
        self.flags.reset(route_id).await?;

        let blobs_deleted = match mode {
            ClearMode::CacheOnly => 0,
            ClearMode::CacheAndStore => self.purge_blobs(route_id).await?,
        };

        info!(cache_entries, blobs_deleted, ?mode, "Cleared route");
        Ok(ClearReport {
            cache_entries,
            blobs_deleted,
        })
    }

    /// Drop the cached thumbnail and reset the flags of a raster.
    #[instrument(skip(self), fields(raster = %raster_id))]
    pub async fn clear_thumbnail(&self, raster_id: &str, mode: ClearMode) -> RouteResult<ClearReport> {
        let cache_entries = self.cache.invalidate(raster_id).await?;
        self.flags.reset(raster_id).await?;

        let blobs_deleted = match mode {
            ClearMode::CacheOnly => 0,
            ClearMode::CacheAndStore => {
                usize::from(self.delete_if_present(&StoragePath::thumbnail(raster_id)).await?)
            }
        };

        Ok(ClearReport {
            cache_entries,
            blobs_deleted,
        })
    }

    /// Delete every stored variant blob of a route, including legacy paths.
    /// Returns how many existed.
    #[instrument(skip(self), fields(route = %route_id))]
    pub async fn purge_blobs(&self, route_id: &str) -> RouteResult<usize> {
        let record = self.routes.route(route_id).await?;
        let Some(raster) = record.raster else {
            return Ok(0);
        };

        let mut deleted = 0;
        for path in StoragePath::all_route_paths(route_id, &raster.id) {
            if self.delete_if_present(&path).await? {
                deleted += 1;
            }
        }

        debug!(deleted, "Purged route blobs");
        Ok(deleted)
    }

    /// Replace a route's track and drop everything rendered from the old one.
    ///
    /// Derived metrics are not recomputed; see [`MapService::refresh_metrics`].
    pub async fn replace_track(&self, route_id: &str, track: Track) -> RouteResult<()> {
        self.routes.update_track(route_id, track).await?;
        self.clear(route_id, ClearMode::CacheOnly).await?;
        Ok(())
    }

    /// Replace a raster and drop its thumbnail and every variant drawn on it.
    pub async fn replace_raster(&self, raster: GeoReferencedRaster) -> RouteResult<()> {
        let raster_id = raster.id.clone();
        self.routes.update_raster(raster).await?;
        self.clear_thumbnail(&raster_id, ClearMode::CacheOnly).await?;

        for route_id in self.routes.route_ids().await? {
            let record = self.routes.route(&route_id).await?;
            if record.raster.as_ref().map(|r| r.id.as_str()) == Some(raster_id.as_str()) {
                self.clear(&route_id, ClearMode::CacheOnly).await?;
            }
        }
        Ok(())
    }

    async fn cached(&self, key: &VariantKey) -> Option<Bytes> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => {
                self.stats.record_cache_hit(key.artifact);
                debug!(size = bytes.len(), "Cache hit");
                Some(bytes)
            }
            Ok(None) => {
                self.stats.record_cache_miss(key.artifact);
                None
            }
            Err(e) => {
                // An unreachable cache degrades to rendering every time.
                warn!(error = %e, "Cache read failed");
                self.stats.record_cache_miss(key.artifact);
                None
            }
        }
    }

    async fn render_variant(
        &self,
        record: RouteRecord,
        raster: RasterRecord,
        variant: RenderVariant,
        key: VariantKey,
    ) -> RouteResult<Bytes> {
        let data = self.routes.raster_data(&raster.id).await?;
        let request = RenderRequest {
            raster: data,
            track: record.track,
            corners: raster.corners,
            variant,
            timezone: record.timezone,
        };

        let started = Instant::now();
        let result = self.renderer.render(&request).await;
        self.stats
            .record_render(variant.into(), started.elapsed(), result.is_ok());
        let image = result.map_err(|e| {
            warn!(error = %e, "Render failed");
            e
        })?;

        let path = StoragePath::variant(&record.id, &raster.id, variant);
        self.persist(&record.id, &key, &path, image).await
    }

    async fn render_thumbnail(&self, raster: RasterRecord, key: VariantKey) -> RouteResult<Bytes> {
        let data = self.routes.raster_data(&raster.id).await?;

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || generate_thumbnail(&data))
            .await
            .map_err(|e| RouteError::Internal(format!("thumbnail worker failed: {}", e)))
            .and_then(|r| r);
        self.stats
            .record_render(Artifact::Thumbnail, started.elapsed(), result.is_ok());
        let image = Bytes::from(result?);

        self.persist(&raster.id, &key, &StoragePath::thumbnail(&raster.id), image)
            .await
    }

    /// Store, flag and cache a rendered artifact, in that order.
    ///
    /// A failed store write leaves neither a flag nor a cache entry behind,
    /// so the next request renders again. The cache is written last: a cache
    /// hit never revisits the flags, so a flag write that failed must not be
    /// hidden behind a cached image.
    async fn persist(&self, subject: &str, key: &VariantKey, path: &str, image: Bytes) -> RouteResult<Bytes> {
        self.blobs.put(path, image.clone()).await?;
        self.stats.record_blob_write(image.len());

        self.flags.set(subject, key.artifact, true).await?;

        if let Err(e) = self.cache.put(key, image.clone()).await {
            warn!(error = %e, key = %key, "Failed to cache rendered image");
        }

        info!(path, size = image.len(), "Persisted rendered image");
        Ok(image)
    }

    async fn delete_if_present(&self, path: &str) -> RouteResult<bool> {
        if !self.blobs.exists(path).await? {
            return Ok(false);
        }
        self.blobs.delete(path).await?;
        Ok(true)
    }
}
