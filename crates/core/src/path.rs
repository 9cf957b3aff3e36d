//! Travel-path construction: densification, precision decimation, and
//! position lookups.

use tracing::debug;

use crate::coordinate::Coordinate;
use crate::geodesy::{distance_meters, interpolate};
use crate::stop::Stop;

/// Interpolation resolution: intermediate points generated per meter of
/// separation between consecutive waypoints.
const POINTS_PER_METER: f64 = 3.0;

/// Expand a sparse waypoint route into a dense travel path.
///
/// Every consecutive waypoint pair is bridged with interpolated points in
/// proportion to its length; consecutive duplicates are collapsed so no two
/// neighbouring entries are equal. An empty or single-point route comes back
/// as-is: there is nothing to interpolate, and that is not an error.
pub fn densify(route: &[Coordinate]) -> Vec<Coordinate> {
    let Some(first) = route.first() else {
        return Vec::new();
    };

    let mut path = vec![first.clone()];
    for pair in route.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let meters = distance_meters(current, next);
        let steps = (POINTS_PER_METER * meters).round() as u64;

        for i in 0..steps {
            let point = interpolate(current, next, i as f64 / steps as f64);
            if path.last() != Some(&point) {
                path.push(point);
            }
        }
        if path.last() != Some(next) {
            path.push(next.clone());
        }
    }

    debug!(
        waypoints = route.len(),
        expanded = path.len(),
        "expanded route into travel path"
    );
    path
}

/// Thin a dense path so that consecutive retained points are roughly
/// `precision_m` meters of arc apart.
///
/// The first and last points are always retained. A point sitting on a stop
/// is retained unconditionally and resets the accumulated distance, so stops
/// survive any precision setting. All other points are retained once the
/// distance accumulated since the last retained point reaches the threshold.
/// A non-positive (or non-finite) precision disables decimation.
pub fn decimate(path: &[Coordinate], stops: &[Stop], precision_m: f64) -> Vec<Coordinate> {
    if !(precision_m > 0.0) {
        return path.to_vec();
    }

    let last = path.len().saturating_sub(1);
    let mut travelled = 0.0;
    let mut kept = Vec::new();

    for (i, point) in path.iter().enumerate() {
        if i == 0 || i == last {
            kept.push(point.clone());
            continue;
        }

        if stops.iter().any(|stop| stop.coordinates == *point) {
            travelled = 0.0;
            kept.push(point.clone());
            continue;
        }

        travelled += distance_meters(point, &path[i + 1]);
        if travelled >= precision_m {
            travelled = 0.0;
            kept.push(point.clone());
        }
    }

    debug!(
        dense = path.len(),
        kept = kept.len(),
        precision_m,
        "decimated travel path"
    );
    kept
}

/// Build the travel path for a route: densify, then decimate under the
/// precision budget.
pub fn build_path(route: &[Coordinate], stops: &[Stop], precision_m: f64) -> Vec<Coordinate> {
    decimate(&densify(route), stops, precision_m)
}

/// Index of the first entry whose position matches `query` exactly.
///
/// Queries are always taken verbatim from the path or the stop list, never
/// recomputed, so exact float comparison is sound here.
pub fn coordinate_index(coordinates: &[Coordinate], query: &Coordinate) -> Option<usize> {
    coordinates.iter().position(|candidate| candidate == query)
}

/// Index of the first stop whose position matches `query` exactly.
pub fn stop_index(stops: &[Stop], query: &Coordinate) -> Option<usize> {
    stops.iter().position(|stop| stop.coordinates == *query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0001, 0.0),
            Coordinate::new(0.0002, 0.0001),
        ]
    }

    #[test]
    fn path_preserves_route_endpoints() {
        let route = route();
        for precision in [0.0, 2.0, 5.0] {
            let path = build_path(&route, &[], precision);
            assert_eq!(path.first(), route.first());
            assert_eq!(path.last(), route.last());
        }
    }

    #[test]
    fn dense_path_has_no_consecutive_duplicates() {
        let path = densify(&route());
        assert!(path.len() > route().len());
        for pair in path.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn densify_handles_degenerate_routes() {
        assert!(densify(&[]).is_empty());

        let single = vec![Coordinate::new(1.0, 2.0)];
        assert_eq!(densify(&single), single);

        // Repeated waypoints collapse instead of duplicating.
        let repeated = vec![Coordinate::new(1.0, 2.0), Coordinate::new(1.0, 2.0)];
        assert_eq!(densify(&repeated), single);
    }

    #[test]
    fn decimation_thins_but_keeps_endpoints() {
        let dense = densify(&route());
        let thinned = decimate(&dense, &[], 5.0);

        assert!(thinned.len() < dense.len());
        assert_eq!(thinned.first(), dense.first());
        assert_eq!(thinned.last(), dense.last());
    }

    #[test]
    fn non_positive_precision_disables_decimation() {
        let dense = densify(&route());
        assert_eq!(decimate(&dense, &[], 0.0), dense);
        assert_eq!(decimate(&dense, &[], -1.0), dense);
        assert_eq!(decimate(&dense, &[], f64::NAN), dense);
    }

    #[test]
    fn stops_survive_any_precision() {
        let route = route();
        let stop = Stop::new("Middle", route[1].clone());
        let dense = densify(&route);

        // Precision far beyond the route length would drop every interior
        // point; the stop must still be retained.
        let thinned = decimate(&dense, &[stop.clone()], 1_000_000.0);
        assert_eq!(thinned, vec![route[0].clone(), route[1].clone(), route[2].clone()]);
        assert!(coordinate_index(&thinned, &stop.coordinates).is_some());
    }

    #[test]
    fn index_lookups_match_exact_positions_only() {
        let path = densify(&route());
        let stops = vec![Stop::new("Origin", path[0].clone())];

        assert_eq!(coordinate_index(&path, &path[3]), Some(3));
        assert_eq!(coordinate_index(&path, &Coordinate::new(9.0, 9.0)), None);
        assert_eq!(stop_index(&stops, &path[0]), Some(0));
        assert_eq!(stop_index(&stops, &path[1]), None);
        assert_eq!(stop_index(&[], &path[0]), None);
    }
}
