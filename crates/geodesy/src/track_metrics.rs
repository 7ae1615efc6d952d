//! Derivation of route metrics from a track and its raster.

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use route_common::{
    Corners, DerivedRouteMetrics, LatLon, RouteError, RouteResult, Track, DEFAULT_TIMEZONE,
};

use crate::distance::{centroid, track_distance};
use crate::gazetteer::{Gazetteer, Region};

/// Inputs for [`derive_metrics`].
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub track: &'a Track,
    /// Corners of the route's raster, if it has one
    pub corners: Option<&'a Corners>,
    /// Start time already recorded for the route
    pub recorded_start: Option<DateTime<Utc>>,
}

/// Compute derived metrics for a route.
///
/// Pure apart from the gazetteer lookup: given the same inputs and `now`,
/// the output is identical. `now` is only used when the track is untimed and
/// the route has no recorded start time.
#[instrument(skip_all, fields(points = input.track.len()))]
pub fn derive_metrics(
    input: MetricsInput<'_>,
    gazetteer: &dyn Gazetteer,
    now: DateTime<Utc>,
) -> RouteResult<DerivedRouteMetrics> {
    let track = input.track;
    let first = track.first();
    let last = track.last();

    let start_time = match first.time {
        Some(seconds) => first.datetime().ok_or_else(|| {
            RouteError::InvalidInput(format!("track start time {} is out of range", seconds))
        })?,
        None => input.recorded_start.unwrap_or(now),
    };

    let duration_seconds = match (first.time, last.time) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };

    let first_location = LatLon::new(first.latitude, first.longitude);
    let raster_center = input.corners.map(centroid);

    let region = resolve_region(gazetteer, first_location, raster_center);

    Ok(DerivedRouteMetrics {
        start_time,
        duration_seconds,
        distance_meters: track_distance(track),
        timezone: region.timezone,
        country_code: region.country_code,
        center: raster_center.unwrap_or(first_location),
    })
}

/// Look up the track's first point, then the raster center, then fall back
/// to UTC with no country. Misses are logged, never returned.
pub fn resolve_region(
    gazetteer: &dyn Gazetteer,
    primary: LatLon,
    fallback: Option<LatLon>,
) -> Region {
    let candidates = std::iter::once(primary).chain(fallback);

    for location in candidates {
        match gazetteer.lookup(location) {
            Ok(region) => return region,
            Err(RouteError::LookupMiss { lat, lon }) => {
                warn!(lat, lon, "No timezone region found");
            }
            Err(e) => {
                warn!(error = %e, "Reverse geocoding failed");
            }
        }
    }

    Region {
        timezone: DEFAULT_TIMEZONE.to_string(),
        country_code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::NoGazetteer;
    use chrono::TimeZone;
    use route_common::TrackPoint;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_timed_track() {
        let track = Track::from_points(vec![
            TrackPoint::new(Some(0.0), 0.0, 0.0),
            TrackPoint::new(Some(10.0), 0.0, 1.0),
        ])
        .unwrap();

        let input = MetricsInput {
            track: &track,
            corners: None,
            recorded_start: None,
        };
        let metrics = derive_metrics(input, &NoGazetteer, now()).unwrap();

        assert_eq!(metrics.duration_seconds, Some(10.0));
        assert_eq!(metrics.start_time.timestamp(), 0);
        assert!((metrics.distance_meters - 111_319.49).abs() < 1.0);
        assert_eq!(metrics.timezone, "UTC");
        assert_eq!(metrics.country_code, None);
        assert_eq!(metrics.center, LatLon::new(0.0, 0.0));
    }

    #[test]
    fn test_untimed_track_keeps_recorded_start() {
        let track = Track::from_points(vec![TrackPoint::new(None, 45.0, 7.0)]).unwrap();
        let recorded = Utc.with_ymd_and_hms(2020, 6, 1, 8, 0, 0).unwrap();

        let input = MetricsInput {
            track: &track,
            corners: None,
            recorded_start: Some(recorded),
        };
        let metrics = derive_metrics(input, &NoGazetteer, now()).unwrap();

        assert_eq!(metrics.start_time, recorded);
        assert_eq!(metrics.duration_seconds, None);
        assert_eq!(metrics.distance_meters, 0.0);
    }

    #[test]
    fn test_untimed_track_without_record_uses_now() {
        let track = Track::from_points(vec![TrackPoint::new(None, 45.0, 7.0)]).unwrap();
        let input = MetricsInput {
            track: &track,
            corners: None,
            recorded_start: None,
        };
        let metrics = derive_metrics(input, &NoGazetteer, now()).unwrap();
        assert_eq!(metrics.start_time, now());
    }

    #[test]
    fn test_track_time_overrides_recorded_start() {
        let track = Track::from_points(vec![TrackPoint::new(Some(100.0), 45.0, 7.0)]).unwrap();
        let input = MetricsInput {
            track: &track,
            corners: None,
            recorded_start: Some(now()),
        };
        let metrics = derive_metrics(input, &NoGazetteer, now()).unwrap();
        assert_eq!(metrics.start_time.timestamp(), 100);
    }

    #[test]
    fn test_center_uses_corners() {
        let track = Track::from_points(vec![TrackPoint::new(None, 0.0, 0.0)]).unwrap();
        let corners = Corners::from_values([1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0]).unwrap();
        let input = MetricsInput {
            track: &track,
            corners: Some(&corners),
            recorded_start: None,
        };
        let metrics = derive_metrics(input, &NoGazetteer, now()).unwrap();
        assert_eq!(metrics.center, LatLon::new(2.0, 2.0));
    }

    #[test]
    fn test_idempotent() {
        let track = Track::from_points(vec![
            TrackPoint::new(Some(5.0), 60.0, 24.0),
            TrackPoint::new(Some(65.0), 60.01, 24.01),
        ])
        .unwrap();
        let input = MetricsInput {
            track: &track,
            corners: None,
            recorded_start: None,
        };

        let a = derive_metrics(input, &NoGazetteer, now()).unwrap();
        let b = derive_metrics(input, &NoGazetteer, now()).unwrap();
        assert_eq!(a, b);
    }
}
