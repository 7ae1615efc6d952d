//! Common test fixtures for route map tests.

/// Corner strings and parsed corner sets.
pub mod corners {
    use route_common::Corners;

    /// Axis-aligned square from (1, 1) to (3, 3); centroid (2, 2).
    pub const SQUARE: &str = "1,1,1,3,3,3,3,1";

    /// A rotated orienteering map near Turku, Finland.
    pub const TURKU: &str = "60.519,22.078,60.518,22.115,60.491,22.112,60.492,22.073";

    /// Straddles the equator and the prime meridian.
    pub const EQUATOR: &str = "0.5,-0.5,0.5,0.5,-0.5,0.5,-0.5,-0.5";

    pub fn square() -> Corners {
        Corners::parse(SQUARE).expect("valid fixture corners")
    }

    pub fn turku() -> Corners {
        Corners::parse(TURKU).expect("valid fixture corners")
    }

    pub fn equator() -> Corners {
        Corners::parse(EQUATOR).expect("valid fixture corners")
    }
}

/// Track fixtures.
pub mod tracks {
    use route_common::{Track, TrackPoint};

    /// Two timed points one degree of longitude apart on the equator.
    pub fn equator_track() -> Track {
        Track::from_points(vec![
            TrackPoint::new(Some(0.0), 0.0, 0.0),
            TrackPoint::new(Some(10.0), 0.0, 1.0),
        ])
        .expect("valid fixture track")
    }

    /// A short timed run inside the Turku map.
    pub fn turku_track() -> Track {
        Track::from_points(vec![
            TrackPoint::new(Some(1_700_000_000.0), 60.515, 22.080),
            TrackPoint::new(Some(1_700_000_030.0), 60.512, 22.090),
            TrackPoint::new(Some(1_700_000_075.0), 60.505, 22.100),
            TrackPoint::new(Some(1_700_000_120.0), 60.495, 22.105),
        ])
        .expect("valid fixture track")
    }

    /// Same positions as [`turku_track`] without timestamps.
    pub fn untimed_track() -> Track {
        let points = turku_track()
            .points()
            .iter()
            .map(|p| TrackPoint::new(None, p.latitude, p.longitude))
            .collect();
        Track::from_points(points).expect("valid fixture track")
    }

    /// Renderer-shaped JSON for [`equator_track`].
    pub const EQUATOR_TRACK_JSON: &str =
        r#"[{"time":0.0,"latlon":[0.0,0.0]},{"time":10.0,"latlon":[0.0,1.0]}]"#;
}

/// Boundary datasets for reverse geocoding.
pub mod boundaries {
    /// File name of the checked-in dataset under `crates/geodesy/testdata/`.
    pub const DATASET_FILE: &str = "boundaries.json";

    /// Minimal inline dataset: one timezone around (0, 0), no countries.
    pub const GULF_OF_GUINEA_JSON: &str = r#"{
        "timezones": [
            {"name": "Etc/GMT", "rings": [[[-7.5, -10.0], [7.5, -10.0], [7.5, 10.0], [-7.5, 10.0], [-7.5, -10.0]]]}
        ],
        "countries": []
    }"#;
}
