//! Reverse geocoding and metric derivation against boundary datasets on disk.

use chrono::{TimeZone, Utc};
use geodesy::{derive_metrics, BoundaryIndex, Gazetteer, MetricsInput};
use route_common::{LatLon, RouteError};
use test_utils::{assert_approx_eq, fixtures, require_test_file};

#[test]
fn test_checked_in_dataset_resolves_finland() {
    let path = require_test_file!(fixtures::boundaries::DATASET_FILE);
    let index = BoundaryIndex::load(path).unwrap();

    let region = index.lookup(LatLon::new(60.5, 22.1)).unwrap();
    assert_eq!(region.timezone, "Europe/Helsinki");
    assert_eq!(region.country_code.as_deref(), Some("FI"));

    let region = index.lookup(LatLon::new(0.0, 0.0)).unwrap();
    assert_eq!(region.timezone, "Etc/GMT");
    assert_eq!(region.country_code, None);
}

#[test]
fn test_load_from_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.json");
    std::fs::write(&path, fixtures::boundaries::GULF_OF_GUINEA_JSON).unwrap();

    let index = BoundaryIndex::load(&path).unwrap();
    assert!(index.lookup(LatLon::new(1.0, 1.0)).is_ok());
    assert!(matches!(
        index.lookup(LatLon::new(60.0, 25.0)),
        Err(RouteError::LookupMiss { .. })
    ));
}

#[test]
fn test_load_missing_or_malformed_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BoundaryIndex::load(dir.path().join("absent.json")),
        Err(RouteError::Config(_))
    ));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(BoundaryIndex::load(&path), Err(RouteError::Config(_))));
}

#[test]
fn test_equator_scenario() {
    let index = BoundaryIndex::from_json(fixtures::boundaries::GULF_OF_GUINEA_JSON).unwrap();
    let track = fixtures::tracks::equator_track();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    let metrics = derive_metrics(
        MetricsInput {
            track: &track,
            corners: None,
            recorded_start: None,
        },
        &index,
        now,
    )
    .unwrap();

    assert_eq!(metrics.duration_seconds, Some(10.0));
    assert_approx_eq!(metrics.distance_meters, 111_319.49, 0.5);
    assert_eq!(metrics.timezone, "Etc/GMT");
}

#[test]
fn test_falls_back_to_raster_center() {
    let path = require_test_file!(fixtures::boundaries::DATASET_FILE);
    let index = BoundaryIndex::load(path).unwrap();

    // track starts at sea, the map itself lies in Finland
    let track = route_common::Track::from_points(vec![route_common::TrackPoint::new(
        None, 45.0, -30.0,
    )])
    .unwrap();
    let corners = fixtures::corners::turku();

    let metrics = derive_metrics(
        MetricsInput {
            track: &track,
            corners: Some(&corners),
            recorded_start: None,
        },
        &index,
        Utc::now(),
    )
    .unwrap();

    assert_eq!(metrics.timezone, "Europe/Helsinki");
    assert_eq!(metrics.country_code.as_deref(), Some("FI"));
}
