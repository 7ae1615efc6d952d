//! Common types and utilities shared across all route map crates.

pub mod data_uri;
pub mod error;
pub mod gpx;
pub mod metrics;
pub mod raster;
pub mod track;
pub mod variant;

pub use data_uri::DataUri;
pub use error::{ErrorKind, RouteError, RouteResult};
pub use metrics::{DerivedRouteMetrics, DEFAULT_TIMEZONE};
pub use raster::{Corners, GeoReferencedRaster, LatLon};
pub use track::{Track, TrackPoint};
pub use variant::{Artifact, ExistenceFlags, RenderVariant};
