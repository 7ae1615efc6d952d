//! GPS track types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RouteError, RouteResult};

/// A single recorded position.
///
/// Serialized in the record shape the map renderer reads:
/// `{"time": 1700000000.0, "latlon": [lat, lon]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PointRecord", into = "PointRecord")]
pub struct TrackPoint {
    /// Epoch seconds, absent for tracks drawn by hand
    pub time: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct PointRecord {
    #[serde(default)]
    time: Option<f64>,
    latlon: [f64; 2],
}

impl From<PointRecord> for TrackPoint {
    fn from(record: PointRecord) -> Self {
        Self {
            time: record.time,
            latitude: record.latlon[0],
            longitude: record.latlon[1],
        }
    }
}

impl From<TrackPoint> for PointRecord {
    fn from(point: TrackPoint) -> Self {
        Self {
            time: point.time,
            latlon: [point.latitude, point.longitude],
        }
    }
}

impl TrackPoint {
    pub fn new(time: Option<f64>, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
        }
    }

    /// Check that both coordinates are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        valid_latitude(self.latitude) && valid_longitude(self.longitude)
    }

    /// Timestamp as a UTC datetime, if the point carries one.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.time.and_then(epoch_to_datetime)
    }
}

/// Convert fractional epoch seconds to a UTC datetime.
pub fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

pub fn valid_latitude(value: f64) -> bool {
    value.is_finite() && (-90.0..=90.0).contains(&value)
}

pub fn valid_longitude(value: f64) -> bool {
    value.is_finite() && (-180.0..=180.0).contains(&value)
}

/// An ordered, non-empty sequence of track points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrackPoint>", into = "Vec<TrackPoint>")]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    /// Build a track, rejecting empty input and out-of-range coordinates.
    pub fn from_points(points: Vec<TrackPoint>) -> RouteResult<Self> {
        if points.is_empty() {
            return Err(RouteError::invalid("track must contain at least one point"));
        }

        if let Some((index, point)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(RouteError::InvalidInput(format!(
                "track point {} has invalid coordinates ({}, {})",
                index, point.latitude, point.longitude
            )));
        }

        Ok(Self { points })
    }

    /// Parse the renderer record format: `[{"time": t, "latlon": [lat, lon]}, ...]`.
    pub fn from_json(json: &str) -> RouteResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> RouteResult<String> {
        Ok(serde_json::to_string(&self.points)?)
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether every point carries a timestamp.
    pub fn is_timed(&self) -> bool {
        self.points.iter().all(|p| p.time.is_some())
    }
}

impl TryFrom<Vec<TrackPoint>> for Track {
    type Error = RouteError;

    fn try_from(points: Vec<TrackPoint>) -> Result<Self, Self::Error> {
        Track::from_points(points)
    }
}

impl From<Track> for Vec<TrackPoint> {
    fn from(track: Track) -> Self {
        track.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_track() {
        let err = Track::from_points(vec![]).unwrap_err();
        assert!(matches!(err, RouteError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_out_of_range_point() {
        let points = vec![
            TrackPoint::new(None, 10.0, 10.0),
            TrackPoint::new(None, 91.0, 10.0),
        ];
        let err = Track::from_points(points).unwrap_err();
        assert!(err.to_string().contains("track point 1"));
    }

    #[test]
    fn test_rejects_nan() {
        let points = vec![TrackPoint::new(None, f64::NAN, 0.0)];
        assert!(Track::from_points(points).is_err());
    }

    #[test]
    fn test_renderer_record_format() {
        let track = Track::from_points(vec![
            TrackPoint::new(Some(0.0), 1.5, 2.5),
            TrackPoint::new(None, 1.6, 2.6),
        ])
        .unwrap();

        let json = track.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"time":0.0,"latlon":[1.5,2.5]},{"time":null,"latlon":[1.6,2.6]}]"#
        );
    }

    #[test]
    fn test_from_json_missing_time() {
        let track = Track::from_json(r#"[{"latlon":[60.5,22.1]}]"#).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.first().time, None);
        assert!(!track.is_timed());
    }

    #[test]
    fn test_from_json_validates() {
        assert!(Track::from_json("[]").is_err());
        assert!(Track::from_json(r#"[{"time":1,"latlon":[0,200]}]"#).is_err());
    }

    #[test]
    fn test_epoch_to_datetime() {
        let dt = epoch_to_datetime(1_700_000_000.5).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
        assert!(epoch_to_datetime(f64::INFINITY).is_none());
    }
}
