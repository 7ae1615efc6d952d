//! Tests for corner coordinate parsing and serialization.

use route_common::{Corners, LatLon, RouteError};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_negative_coordinates() {
    let corners = Corners::parse("-33.9,-70.7,-33.9,-70.6,-34.0,-70.6,-34.0,-70.7").unwrap();
    assert_eq!(corners.top_left, LatLon::new(-33.9, -70.7));
    assert_eq!(corners.bottom_right, LatLon::new(-34.0, -70.6));
}

#[test]
fn test_parse_integers() {
    let corners = Corners::parse("1,1,1,3,3,3,3,1").unwrap();
    assert_eq!(corners.values(), [1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0]);
}

#[test]
fn test_parse_rejects_whitespace() {
    let err = Corners::parse("1, 1,1,3,3,3,3,1").unwrap_err();
    assert!(matches!(err, RouteError::InvalidInput(_)));
}

#[test]
fn test_parse_rejects_empty_field() {
    assert!(Corners::parse("1,,1,3,3,3,3,1").is_err());
    assert!(Corners::parse("").is_err());
}

#[test]
fn test_from_values_rejects_nan() {
    let mut values = [1.0; 8];
    values[5] = f64::NAN;
    assert!(Corners::from_values(values).is_err());
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_json_roundtrip() {
    let corners = Corners::parse("60.519,22.078,60.518,22.115,60.491,22.112,60.492,22.073").unwrap();
    let json = serde_json::to_string(&corners).unwrap();
    assert_eq!(
        json,
        r#"{"top_left":[60.519,22.078],"top_right":[60.518,22.115],"bottom_right":[60.491,22.112],"bottom_left":[60.492,22.073]}"#
    );

    let parsed: Corners = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, corners);
}

#[test]
fn test_corner_string_keeps_precision() {
    let s = "45.123456,-122.654321,45.12,-122.6,45.0,-122.6,45.0,-122.7";
    let corners = Corners::parse(s).unwrap();
    let reparsed = Corners::parse(&corners.to_corner_string()).unwrap();
    assert_eq!(reparsed, corners);
}
