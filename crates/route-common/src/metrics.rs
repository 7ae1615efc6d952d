//! Derived route metrics value object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raster::LatLon;

/// Timezone used when reverse geocoding finds no enclosing zone.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Fields derived from a route's track and raster.
///
/// Computed by a pure function and stored separately; never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRouteMetrics {
    pub start_time: DateTime<Utc>,
    /// Seconds between first and last point, absent for untimed tracks
    pub duration_seconds: Option<f64>,
    pub distance_meters: f64,
    /// IANA timezone name
    pub timezone: String,
    /// ISO 3166-1 alpha-2 code
    pub country_code: Option<String>,
    pub center: LatLon,
}
