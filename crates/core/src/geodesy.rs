//! Great-circle distance and interpolation.
//!
//! Uses the Haversine formula for distances on Earth's surface and
//! spherical linear interpolation for points along a great-circle arc.

use geo::{HaversineDistance, HaversineIntermediate};

use crate::coordinate::Coordinate;

/// Mean earth radius in meters, matching the haversine implementation in
/// the `geo` crate.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Haversine central angle between two coordinates, in radians.
pub fn central_angle(a: &Coordinate, b: &Coordinate) -> f64 {
    distance_meters(a, b) / EARTH_RADIUS_METERS
}

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    a.point().haversine_distance(&b.point())
}

/// Haversine distance between two coordinates, in kilometers.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    distance_meters(a, b) / 1000.0
}

/// Spherical linear interpolation along the great circle from `a` to `b`.
///
/// The fraction is clamped to `[0, 1]` so the endpoints come back exactly at
/// the boundaries, and `a` comes back for any fraction when the two
/// positions coincide. Elevation and metadata travel with `a` unchanged.
pub fn interpolate(a: &Coordinate, b: &Coordinate, fraction: f64) -> Coordinate {
    if a == b || fraction <= 0.0 {
        return a.clone();
    }

    let target = if fraction >= 1.0 {
        b.point()
    } else {
        a.point().haversine_intermediate(&b.point(), fraction)
    };

    Coordinate {
        longitude: target.x(),
        latitude: target.y(),
        elevation: a.elevation,
        properties: a.properties.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_degree_of_latitude() {
        // One degree of latitude on the mean-radius sphere.
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);

        let meters = distance_meters(&a, &b);
        assert!((meters - 111_195.0).abs() < 1.0, "got {meters}");
        assert_relative_eq!(central_angle(&a, &b), 1.0_f64.to_radians(), epsilon = 1e-9);
        assert_relative_eq!(distance_km(&a, &b), meters / 1000.0);
    }

    #[test]
    fn distance_is_non_negative_and_zero_on_self() {
        let a = Coordinate::new(-92.466717, 44.021788);
        let b = Coordinate::new(13.377704, 52.516275);

        assert_eq!(distance_meters(&a, &a), 0.0);
        assert!(distance_meters(&a, &b) > 0.0);
        assert_relative_eq!(distance_meters(&a, &b), distance_meters(&b, &a));
    }

    #[test]
    fn interpolation_endpoints_are_exact() {
        let a = Coordinate::new(-92.0, 44.0);
        let b = Coordinate::new(-92.1, 44.1);

        assert_eq!(interpolate(&a, &b, 0.0), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);
        assert_eq!(interpolate(&a, &b, -0.5), a);
        assert_eq!(interpolate(&a, &b, 1.5), b);
    }

    #[test]
    fn interpolation_on_coincident_points_returns_start() {
        let a = Coordinate::new(-92.0, 44.0);
        let b = Coordinate::new(-92.0, 44.0);

        for fraction in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(interpolate(&a, &b, fraction), a);
        }
    }

    #[test]
    fn midpoint_of_a_meridian_arc() {
        let a = Coordinate::new(10.0, 0.0);
        let b = Coordinate::new(10.0, 2.0);

        let mid = interpolate(&a, &b, 0.5);
        assert_relative_eq!(mid.longitude, 10.0, epsilon = 1e-9);
        assert_relative_eq!(mid.latitude, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn interpolation_carries_elevation_and_metadata() {
        let mut a = Coordinate::new(-92.0, 44.0);
        a.elevation = Some(310.0);
        a.properties = Some(serde_json::Map::from_iter([(
            "name".into(),
            serde_json::json!("depot"),
        )]));
        let b = Coordinate::new(-92.1, 44.1);

        let between = interpolate(&a, &b, 0.5);
        assert_eq!(between.elevation, Some(310.0));
        assert_eq!(between.properties, a.properties);
    }
}
