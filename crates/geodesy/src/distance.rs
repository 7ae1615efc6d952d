//! Great-circle distance and corner centroid.
//!
//! Distances use the haversine formula on a sphere with the WGS84
//! equatorial radius, about 0.1% longer than with the mean radius.
//! Results must stay identical to the distances already stored for routes.

use std::f64::consts::PI;

use route_common::{Corners, LatLon, RouteError, RouteResult, Track};

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

const TO_RAD: f64 = PI / 180.0;

/// Haversine distance between two coordinates, in meters.
pub fn haversine(from: LatLon, to: LatLon) -> f64 {
    let dlat = (to.lat - from.lat) * TO_RAD;
    let dlon = (to.lon - from.lon) * TO_RAD;

    let a = (dlat / 2.0).sin().powi(2)
        + (from.lat * TO_RAD).cos() * (to.lat * TO_RAD).cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Sum of haversine distances over consecutive points.
///
/// Returns 0 for a single point.
pub fn track_distance(track: &Track) -> f64 {
    track
        .points()
        .windows(2)
        .map(|pair| {
            haversine(
                LatLon::new(pair[0].latitude, pair[0].longitude),
                LatLon::new(pair[1].latitude, pair[1].longitude),
            )
        })
        .sum()
}

/// Distance over raw points, rejecting an empty sequence.
pub fn distance(points: &[LatLon]) -> RouteResult<f64> {
    if points.is_empty() {
        return Err(RouteError::invalid("distance of an empty track is undefined"));
    }

    Ok(points.windows(2).map(|pair| haversine(pair[0], pair[1])).sum())
}

/// Arithmetic mean of the four corner latitudes and longitudes.
///
/// Not a geodesic centroid; good enough as a representative location for
/// timezone and country lookup. Rasters crossing the antimeridian get a
/// meaningless longitude.
pub fn centroid(corners: &Corners) -> LatLon {
    let points = [
        corners.top_left,
        corners.top_right,
        corners.bottom_right,
        corners.bottom_left,
    ];

    let lat = points.iter().map(|p| p.lat).sum::<f64>() / 4.0;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / 4.0;
    LatLon::new(lat, lon)
}
