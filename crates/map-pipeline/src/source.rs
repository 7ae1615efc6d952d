//! Route and raster records the pipeline reads from.
//!
//! The pipeline never owns routes: an application database (or a manifest
//! file for batch jobs) sits behind [`RouteSource`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use route_common::{
    Corners, DerivedRouteMetrics, GeoReferencedRaster, RouteError, RouteResult, Track,
    DEFAULT_TIMEZONE,
};

/// Raster metadata without pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRecord {
    pub id: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub corners: Corners,
    /// See [`GeoReferencedRaster::content_hash`]
    pub content_hash: String,
}

impl From<&GeoReferencedRaster> for RasterRecord {
    fn from(raster: &GeoReferencedRaster) -> Self {
        Self {
            id: raster.id.clone(),
            mime_type: raster.mime_type.clone(),
            width: raster.width,
            height: raster.height,
            corners: raster.corners,
            content_hash: raster.content_hash(),
        }
    }
}

/// A route with its track and the raster it is drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub id: String,
    pub raster: Option<RasterRecord>,
    pub track: Track,
    /// Timezone last derived for the route
    pub timezone: String,
    /// Start time last derived for the route
    pub start_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Fails with [`RouteError::NotFound`] for unknown routes.
    async fn route(&self, route_id: &str) -> RouteResult<RouteRecord>;

    async fn raster(&self, raster_id: &str) -> RouteResult<RasterRecord>;

    /// Encoded raster bytes, loaded only when a render needs them.
    async fn raster_data(&self, raster_id: &str) -> RouteResult<Bytes>;

    async fn route_ids(&self) -> RouteResult<Vec<String>>;

    /// Persist derived metrics; the timezone and start time feed later renders.
    async fn save_metrics(&self, route_id: &str, metrics: &DerivedRouteMetrics) -> RouteResult<()>;

    /// Replace a route's track. Stored metrics for the route are dropped.
    async fn update_track(&self, route_id: &str, track: Track) -> RouteResult<()>;

    /// Insert or replace a raster.
    async fn update_raster(&self, raster: GeoReferencedRaster) -> RouteResult<()>;
}

#[derive(Debug, Clone)]
struct StoredRoute {
    raster_id: Option<String>,
    track: Track,
    timezone: String,
    start_time: Option<DateTime<Utc>>,
    metrics: Option<DerivedRouteMetrics>,
}

/// Route source held entirely in memory.
#[derive(Default)]
pub struct MemoryRouteSource {
    rasters: RwLock<HashMap<String, (RasterRecord, Bytes)>>,
    routes: RwLock<HashMap<String, StoredRoute>>,
}

impl MemoryRouteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_raster(&self, raster: GeoReferencedRaster) {
        let record = RasterRecord::from(&raster);
        self.rasters
            .write()
            .await
            .insert(raster.id.clone(), (record, raster.data));
    }

    /// Add a route. A referenced raster must already be present.
    pub async fn insert_route(
        &self,
        route_id: &str,
        raster_id: Option<&str>,
        track: Track,
        timezone: Option<&str>,
    ) -> RouteResult<()> {
        if let Some(raster_id) = raster_id {
            if !self.rasters.read().await.contains_key(raster_id) {
                return Err(RouteError::NotFound(format!("raster {}", raster_id)));
            }
        }

        self.routes.write().await.insert(
            route_id.to_string(),
            StoredRoute {
                raster_id: raster_id.map(str::to_string),
                track,
                timezone: timezone.unwrap_or(DEFAULT_TIMEZONE).to_string(),
                start_time: None,
                metrics: None,
            },
        );
        Ok(())
    }

    /// Metrics saved for a route, if any.
    pub async fn metrics(&self, route_id: &str) -> Option<DerivedRouteMetrics> {
        self.routes
            .read()
            .await
            .get(route_id)
            .and_then(|r| r.metrics.clone())
    }
}

#[async_trait]
impl RouteSource for MemoryRouteSource {
    async fn route(&self, route_id: &str) -> RouteResult<RouteRecord> {
        let stored = self
            .routes
            .read()
            .await
            .get(route_id)
            .cloned()
            .ok_or_else(|| RouteError::NotFound(format!("route {}", route_id)))?;

        let raster = match &stored.raster_id {
            Some(raster_id) => Some(self.raster(raster_id).await?),
            None => None,
        };

        Ok(RouteRecord {
            id: route_id.to_string(),
            raster,
            track: stored.track,
            timezone: stored.timezone,
            start_time: stored.start_time,
        })
    }

    async fn raster(&self, raster_id: &str) -> RouteResult<RasterRecord> {
        self.rasters
            .read()
            .await
            .get(raster_id)
            .map(|(record, _)| record.clone())
            .ok_or_else(|| RouteError::NotFound(format!("raster {}", raster_id)))
    }

    async fn raster_data(&self, raster_id: &str) -> RouteResult<Bytes> {
        self.rasters
            .read()
            .await
            .get(raster_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| RouteError::NotFound(format!("raster {}", raster_id)))
    }

    async fn route_ids(&self) -> RouteResult<Vec<String>> {
        let mut ids: Vec<String> = self.routes.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn save_metrics(&self, route_id: &str, metrics: &DerivedRouteMetrics) -> RouteResult<()> {
        let mut routes = self.routes.write().await;
        let stored = routes
            .get_mut(route_id)
            .ok_or_else(|| RouteError::NotFound(format!("route {}", route_id)))?;

        stored.timezone = metrics.timezone.clone();
        stored.start_time = Some(metrics.start_time);
        stored.metrics = Some(metrics.clone());
        Ok(())
    }

    async fn update_track(&self, route_id: &str, track: Track) -> RouteResult<()> {
        let mut routes = self.routes.write().await;
        let stored = routes
            .get_mut(route_id)
            .ok_or_else(|| RouteError::NotFound(format!("route {}", route_id)))?;

        stored.track = track;
        stored.metrics = None;
        Ok(())
    }

    async fn update_raster(&self, raster: GeoReferencedRaster) -> RouteResult<()> {
        self.insert_raster(raster).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_common::{LatLon, TrackPoint};

    fn track() -> Track {
        Track::from_points(vec![TrackPoint::new(Some(0.0), 1.0, 2.0)]).unwrap()
    }

    fn raster(id: &str) -> GeoReferencedRaster {
        GeoReferencedRaster {
            id: id.to_string(),
            mime_type: "image/jpeg".to_string(),
            data: Bytes::from_static(b"jpeg"),
            width: 600,
            height: 600,
            corners: Corners::parse("1,1,1,3,3,3,3,1").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_route_joins_raster() {
        let source = MemoryRouteSource::new();
        source.insert_raster(raster("m1")).await;
        source
            .insert_route("r1", Some("m1"), track(), None)
            .await
            .unwrap();

        let record = source.route("r1").await.unwrap();
        assert_eq!(record.timezone, "UTC");
        let raster = record.raster.unwrap();
        assert_eq!(raster.id, "m1");
        assert_eq!(raster.content_hash.len(), 64);
        assert_eq!(source.raster_data("m1").await.unwrap(), Bytes::from_static(b"jpeg"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let source = MemoryRouteSource::new();
        assert!(matches!(source.route("x").await, Err(RouteError::NotFound(_))));
        assert!(matches!(source.raster("x").await, Err(RouteError::NotFound(_))));
        assert!(source
            .insert_route("r1", Some("missing"), track(), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_track_update_drops_metrics() {
        let source = MemoryRouteSource::new();
        source.insert_route("r1", None, track(), None).await.unwrap();

        let metrics = DerivedRouteMetrics {
            start_time: Utc::now(),
            duration_seconds: None,
            distance_meters: 0.0,
            timezone: "Europe/Helsinki".to_string(),
            country_code: Some("FI".to_string()),
            center: LatLon::new(1.0, 2.0),
        };
        source.save_metrics("r1", &metrics).await.unwrap();
        assert_eq!(source.route("r1").await.unwrap().timezone, "Europe/Helsinki");
        assert!(source.metrics("r1").await.is_some());

        source.update_track("r1", track()).await.unwrap();
        assert!(source.metrics("r1").await.is_none());
    }
}
