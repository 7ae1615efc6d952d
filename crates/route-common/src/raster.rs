//! Georeferenced raster maps and their corner coordinates.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data_uri::DataUri;
use crate::error::{RouteError, RouteResult};
use crate::track::{valid_latitude, valid_longitude};

/// A (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for LatLon {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(point: LatLon) -> Self {
        [point.lat, point.lon]
    }
}

/// The four corners of a raster projected onto the Earth.
///
/// Serializes as the named-corner object handed to the map renderer:
/// `{"top_left": [lat, lon], "top_right": ..., "bottom_right": ..., "bottom_left": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub top_left: LatLon,
    pub top_right: LatLon,
    pub bottom_right: LatLon,
    pub bottom_left: LatLon,
}

impl Corners {
    /// Build from 8 values ordered top-left, top-right, bottom-right,
    /// bottom-left, each as latitude then longitude.
    pub fn from_values(values: [f64; 8]) -> RouteResult<Self> {
        for (i, pair) in values.chunks(2).enumerate() {
            if !valid_latitude(pair[0]) {
                return Err(RouteError::InvalidInput(format!(
                    "corner {} latitude {} out of range -90.0 90.0",
                    i, pair[0]
                )));
            }
            if !valid_longitude(pair[1]) {
                return Err(RouteError::InvalidInput(format!(
                    "corner {} longitude {} out of range -180.0 180.0",
                    i, pair[1]
                )));
            }
        }

        Ok(Self {
            top_left: LatLon::new(values[0], values[1]),
            top_right: LatLon::new(values[2], values[3]),
            bottom_right: LatLon::new(values[4], values[5]),
            bottom_left: LatLon::new(values[6], values[7]),
        })
    }

    /// Parse a corner string: "60.519,22.078,60.518,22.115,60.491,22.112,60.492,22.073"
    pub fn parse(s: &str) -> RouteResult<Self> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 8 {
            return Err(RouteError::invalid(
                "corners coordinates must have 8 float values separated by commas",
            ));
        }

        let mut values = [0.0; 8];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if !is_plain_decimal(part) {
                return Err(RouteError::InvalidInput(format!(
                    "corners coordinates must only contain float values, got '{}'",
                    part
                )));
            }
            *slot = part
                .parse()
                .map_err(|_| RouteError::InvalidInput(format!("invalid number: {}", part)))?;
        }

        Self::from_values(values)
    }

    pub fn values(&self) -> [f64; 8] {
        [
            self.top_left.lat,
            self.top_left.lon,
            self.top_right.lat,
            self.top_right.lon,
            self.bottom_right.lat,
            self.bottom_right.lon,
            self.bottom_left.lat,
            self.bottom_left.lon,
        ]
    }

    /// Named-corner bounds object, each corner as `[lat, lon]`.
    pub fn bounds(&self) -> serde_json::Value {
        let pair = |p: LatLon| serde_json::json!([p.lat, p.lon]);
        serde_json::json!({
            "top_left": pair(self.top_left),
            "top_right": pair(self.top_right),
            "bottom_right": pair(self.bottom_right),
            "bottom_left": pair(self.bottom_left),
        })
    }

    pub fn to_corner_string(&self) -> String {
        self.values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// `-?[0-9]{1,3}(\.[0-9]+)?`
fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let int_ok = (1..=3).contains(&int_part.len()) && int_part.bytes().all(|b| b.is_ascii_digit());
    let frac_ok = match frac_part {
        Some(f) => !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    };

    int_ok && frac_ok
}

/// A raster map image with its georeference.
///
/// Owned by exactly one raster record; routes share it by id.
#[derive(Debug, Clone)]
pub struct GeoReferencedRaster {
    pub id: String,
    pub mime_type: String,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub corners: Corners,
}

impl GeoReferencedRaster {
    pub fn data_uri(&self) -> String {
        DataUri::encode(&self.mime_type, &self.data)
    }

    /// SHA-256 over the data URI and the corner string, hex encoded.
    ///
    /// Changes whenever either the pixels or the georeference change.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.data_uri().as_bytes());
        hasher.update(self.corners.to_corner_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
