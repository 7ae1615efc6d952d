//! Render-and-cache pipeline for route maps.
//!
//! [`MapService`] answers "variant V of route R" from the variant cache, or
//! renders, stores, caches and flags it on a miss. Batch jobs (warm-up,
//! metric refresh) are methods on the same service.

pub mod jobs;
pub mod manifest;
pub mod service;
pub mod source;
pub mod stats;

pub use jobs::{MetricsOutcome, WarmReport, WarmTarget, WARM_VARIANTS};
pub use manifest::{RasterEntry, RouteEntry, RouteManifest};
pub use service::{ClearMode, ClearReport, MapService};
pub use source::{MemoryRouteSource, RasterRecord, RouteRecord, RouteSource};
pub use stats::{PipelineStats, StatsSnapshot};
