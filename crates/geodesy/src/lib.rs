//! Geodesic computations over tracks and raster corners.
//!
//! - Haversine track distance
//! - Corner centroid
//! - Reverse geocoding to timezone and country
//! - Derived route metrics

pub mod distance;
pub mod gazetteer;
pub mod track_metrics;

pub use distance::{centroid, distance, haversine, track_distance, EARTH_RADIUS_M};
pub use gazetteer::{BoundaryDataset, BoundaryIndex, BoundaryRecord, Gazetteer, NoGazetteer, Region};
pub use track_metrics::{derive_metrics, resolve_region, MetricsInput};
