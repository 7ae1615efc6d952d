//! Reverse geocoding: coordinate to timezone and country.

use std::path::Path;

use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use serde::Deserialize;
use tracing::{debug, info};

use route_common::{LatLon, RouteError, RouteResult};

/// Result of a successful reverse geocode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// IANA timezone name
    pub timezone: String,
    /// ISO 3166-1 alpha-2 code, when the point is inside a known country
    pub country_code: Option<String>,
}

/// Point-in-region lookup service.
///
/// Returns [`RouteError::LookupMiss`] when no timezone encloses the point.
pub trait Gazetteer: Send + Sync {
    fn lookup(&self, point: LatLon) -> RouteResult<Region>;
}

/// Gazetteer that knows no regions; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGazetteer;

impl Gazetteer for NoGazetteer {
    fn lookup(&self, point: LatLon) -> RouteResult<Region> {
        Err(RouteError::LookupMiss {
            lat: point.lat,
            lon: point.lon,
        })
    }
}

/// On-disk boundary dataset.
///
/// ```json
/// {
///   "timezones": [{"name": "Europe/Helsinki", "rings": [[[lon, lat], ...]]}],
///   "countries": [{"name": "FI", "rings": [[[lon, lat], ...]]}]
/// }
/// ```
///
/// Each ring is an exterior boundary in (lon, lat) order; a region may have
/// several disjoint rings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoundaryDataset {
    #[serde(default)]
    pub timezones: Vec<BoundaryRecord>,
    #[serde(default)]
    pub countries: Vec<BoundaryRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryRecord {
    pub name: String,
    pub rings: Vec<Vec<[f64; 2]>>,
}

struct IndexedRegion {
    name: String,
    shape: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl IndexedRegion {
    fn build(record: BoundaryRecord) -> Option<Self> {
        let polygons: Vec<Polygon<f64>> = record
            .rings
            .into_iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| {
                let coords: Vec<Coord<f64>> =
                    ring.into_iter().map(|[x, y]| Coord { x, y }).collect();
                Polygon::new(LineString::from(coords), vec![])
            })
            .collect();

        let shape = MultiPolygon::new(polygons);
        let bbox = shape.bounding_rect()?;
        Some(Self {
            name: record.name,
            shape,
            bbox,
        })
    }

    fn contains(&self, point: &Coord<f64>) -> bool {
        self.bbox.intersects(point) && self.shape.intersects(point)
    }
}

/// In-memory polygon index over timezone and country boundaries.
///
/// Lookups scan regions linearly with a bounding-box prefilter. Boundary
/// points count as inside; on overlaps the first listed region wins.
pub struct BoundaryIndex {
    timezones: Vec<IndexedRegion>,
    countries: Vec<IndexedRegion>,
}

impl BoundaryIndex {
    pub fn new(dataset: BoundaryDataset) -> Self {
        let timezones: Vec<_> = dataset
            .timezones
            .into_iter()
            .filter_map(IndexedRegion::build)
            .collect();
        let countries: Vec<_> = dataset
            .countries
            .into_iter()
            .filter_map(IndexedRegion::build)
            .collect();

        info!(
            timezones = timezones.len(),
            countries = countries.len(),
            "Built boundary index"
        );

        Self {
            timezones,
            countries,
        }
    }

    pub fn from_json(json: &str) -> RouteResult<Self> {
        let dataset: BoundaryDataset = serde_json::from_str(json)
            .map_err(|e| RouteError::Config(format!("invalid boundary dataset: {}", e)))?;
        Ok(Self::new(dataset))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> RouteResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RouteError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    fn find<'a>(regions: &'a [IndexedRegion], point: &Coord<f64>) -> Option<&'a str> {
        regions
            .iter()
            .find(|r| r.contains(point))
            .map(|r| r.name.as_str())
    }
}

impl Gazetteer for BoundaryIndex {
    fn lookup(&self, location: LatLon) -> RouteResult<Region> {
        let point = Coord {
            x: location.lon,
            y: location.lat,
        };

        let timezone = Self::find(&self.timezones, &point).ok_or(RouteError::LookupMiss {
            lat: location.lat,
            lon: location.lon,
        })?;
        let country_code = Self::find(&self.countries, &point).map(str::to_string);

        debug!(lat = location.lat, lon = location.lon, timezone, "Reverse geocoded");
        Ok(Region {
            timezone: timezone.to_string(),
            country_code,
        })
    }
}
