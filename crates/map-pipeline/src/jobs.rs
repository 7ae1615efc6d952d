//! Batch maintenance over many routes.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use geodesy::{derive_metrics, MetricsInput};
use route_common::{DerivedRouteMetrics, RenderVariant, RouteError, RouteResult};

use crate::source::RouteRecord;
use crate::service::MapService;

/// Variants rendered ahead of time. The blank variant is only rendered on
/// demand.
pub const WARM_VARIANTS: [RenderVariant; 3] = [
    RenderVariant::Header,
    RenderVariant::Route,
    RenderVariant::HeaderAndRoute,
];

/// One unit of warm-up work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmTarget {
    /// The route itself could not be loaded
    Route { route_id: String },
    Variant { route_id: String, variant: RenderVariant },
    Thumbnail { raster_id: String },
}

impl fmt::Display for WarmTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarmTarget::Route { route_id } => f.write_str(route_id),
            WarmTarget::Variant { route_id, variant } => write!(f, "{}/{}", route_id, variant),
            WarmTarget::Thumbnail { raster_id } => write!(f, "{}/thumbnail", raster_id),
        }
    }
}

/// A render queued by warm-up.
enum WarmJob {
    Variant { route_id: String, variant: RenderVariant },
    Thumbnail { raster_id: String },
}

impl From<WarmJob> for WarmTarget {
    fn from(job: WarmJob) -> Self {
        match job {
            WarmJob::Variant { route_id, variant } => WarmTarget::Variant { route_id, variant },
            WarmJob::Thumbnail { raster_id } => WarmTarget::Thumbnail { raster_id },
        }
    }
}

#[derive(Debug, Default)]
pub struct WarmReport {
    pub rendered: usize,
    /// Targets already flagged as persisted
    pub skipped: usize,
    pub failures: Vec<(WarmTarget, RouteError)>,
}

/// Result of recomputing one route's metrics.
#[derive(Debug)]
pub struct MetricsOutcome {
    pub route_id: String,
    pub result: RouteResult<DerivedRouteMetrics>,
}

impl MapService {
    /// Render every missing pre-rendered variant and raster thumbnail.
    ///
    /// Failures are collected per target; one failing route does not stop
    /// the others.
    #[instrument(skip(self, route_ids), fields(routes = route_ids.len()))]
    pub async fn warm_all(&self, route_ids: &[String], concurrency: usize) -> WarmReport {
        let mut report = WarmReport::default();
        let mut jobs = Vec::new();
        let mut rasters = BTreeSet::new();

        for route_id in route_ids {
            let record = match self.routes.route(route_id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(route = %route_id, error = %e, "Skipping route");
                    report.failures.push((
                        WarmTarget::Route {
                            route_id: route_id.clone(),
                        },
                        e,
                    ));
                    continue;
                }
            };
            let Some(raster) = record.raster else {
                debug!(route = %route_id, "Route has no raster map");
                continue;
            };
            rasters.insert(raster.id);

            let flags = match self.flags.get(route_id).await {
                Ok(flags) => flags,
                Err(e) => {
                    warn!(route = %route_id, error = %e, "Flag lookup failed, rendering anyway");
                    Default::default()
                }
            };
            for variant in WARM_VARIANTS {
                if flags.get(variant.into()) {
                    report.skipped += 1;
                } else {
                    jobs.push(WarmJob::Variant {
                        route_id: route_id.clone(),
                        variant,
                    });
                }
            }
        }

        for raster_id in rasters {
            let has_thumbnail = self
                .flags
                .get(&raster_id)
                .await
                .map(|f| f.has_thumbnail)
                .unwrap_or(false);
            if has_thumbnail {
                report.skipped += 1;
            } else {
                jobs.push(WarmJob::Thumbnail { raster_id });
            }
        }

        let results: Vec<_> = stream::iter(jobs)
            .map(|job| async move {
                let result = match &job {
                    WarmJob::Variant { route_id, variant } => {
                        self.get_variant(route_id, *variant).await.map(|_| ())
                    }
                    WarmJob::Thumbnail { raster_id } => {
                        self.get_thumbnail(raster_id).await.map(|_| ())
                    }
                };
                (WarmTarget::from(job), result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (target, result) in results {
            match result {
                Ok(_) => report.rendered += 1,
                Err(e) => {
                    warn!(target = %target, error = %e, "Warm-up render failed");
                    report.failures.push((target, e));
                }
            }
        }

        info!(
            rendered = report.rendered,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Warm-up complete"
        );
        report
    }

    /// Recompute and save derived metrics for each route.
    ///
    /// Derivation runs on the rayon pool; `now` stands in for the start time
    /// of untimed tracks with no recorded start.
    #[instrument(skip(self, route_ids), fields(routes = route_ids.len()))]
    pub async fn refresh_metrics(
        &self,
        route_ids: &[String],
        now: DateTime<Utc>,
    ) -> RouteResult<Vec<MetricsOutcome>> {
        let mut outcomes = Vec::with_capacity(route_ids.len());
        let mut records: Vec<RouteRecord> = Vec::with_capacity(route_ids.len());

        for route_id in route_ids {
            match self.routes.route(route_id).await {
                Ok(record) => records.push(record),
                Err(e) => outcomes.push(MetricsOutcome {
                    route_id: route_id.clone(),
                    result: Err(e),
                }),
            }
        }

        let gazetteer = self.gazetteer.clone();
        let derived = tokio::task::spawn_blocking(move || {
            records
                .par_iter()
                .map(|record| {
                    let input = MetricsInput {
                        track: &record.track,
                        corners: record.raster.as_ref().map(|r| &r.corners),
                        recorded_start: record.start_time,
                    };
                    (record.id.clone(), derive_metrics(input, gazetteer.as_ref(), now))
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| RouteError::Internal(format!("metrics worker failed: {}", e)))?;

        for (route_id, result) in derived {
            let result = match result {
                Ok(metrics) => self
                    .routes
                    .save_metrics(&route_id, &metrics)
                    .await
                    .map(|_| metrics),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!(route = %route_id, error = %e, "Metrics refresh failed");
            }
            outcomes.push(MetricsOutcome { route_id, result });
        }

        info!(routes = outcomes.len(), "Refreshed route metrics");
        Ok(outcomes)
    }
}
