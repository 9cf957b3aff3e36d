//! Telemetry event payloads and their factories.
//!
//! Factories are pure functions over path and stop data: no I/O, no mutable
//! state. Distances are kilometers. Timestamps are not assigned here; the
//! dispatcher stamps each event at delivery time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coordinate::Coordinate;
use crate::geodesy::distance_km;
use crate::stop::Stop;

/// A telemetry event as it appears on the wire, minus the dispatch
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RouteInfo {
        coordinates: Vec<Coordinate>,
        stops: Vec<Stop>,
        distance: f64,
    },
    TripStart {
        from_coordinates: Coordinate,
        to_coordinates: Coordinate,
        distance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_stop: Option<Stop>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_stop: Option<Stop>,
    },
    TripEnd {
        from_coordinates: Coordinate,
        to_coordinates: Coordinate,
        distance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_stop: Option<Stop>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_stop: Option<Stop>,
    },
    GeoPosition {
        coordinates: Coordinate,
        distance_travelled: f64,
        distance_remaining: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Map<String, Value>>,
    },
    DoorOpen,
    DoorClose,
}

impl Event {
    /// The wire tag, handy for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RouteInfo { .. } => "route_info",
            Event::TripStart { .. } => "trip_start",
            Event::TripEnd { .. } => "trip_end",
            Event::GeoPosition { .. } => "geo_position",
            Event::DoorOpen => "door_open",
            Event::DoorClose => "door_close",
        }
    }
}

fn km_over(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_km(&pair[0], &pair[1]))
        .sum()
}

fn stop_at(stops: &[Stop], point: &Coordinate) -> Option<Stop> {
    stops
        .iter()
        .find(|stop| stop.coordinates == *point)
        .cloned()
}

/// Route summary emitted once per run, before the first trip.
pub fn route_info(route: &[Coordinate], stops: &[Stop]) -> Event {
    Event::RouteInfo {
        coordinates: route.to_vec(),
        stops: stops.to_vec(),
        distance: km_over(route),
    }
}

fn trip_fields(
    segment: &[Coordinate],
    stops: &[Stop],
) -> (Coordinate, Coordinate, f64, Option<Stop>, Option<Stop>) {
    let from = segment.first().cloned().unwrap_or_default();
    let to = segment.last().cloned().unwrap_or_default();
    let from_stop = stop_at(stops, &from);
    let to_stop = stop_at(stops, &to);
    (from, to, km_over(segment), from_stop, to_stop)
}

/// Departure onto a trip segment. The matching stop record is attached for
/// either endpoint that has one; a mid-path endpoint simply has none.
pub fn trip_start(segment: &[Coordinate], stops: &[Stop]) -> Event {
    let (from_coordinates, to_coordinates, distance, from_stop, to_stop) =
        trip_fields(segment, stops);
    Event::TripStart {
        from_coordinates,
        to_coordinates,
        distance,
        from_stop,
        to_stop,
    }
}

/// Arrival at the end of a trip segment.
pub fn trip_end(segment: &[Coordinate], stops: &[Stop]) -> Event {
    let (from_coordinates, to_coordinates, distance, from_stop, to_stop) =
        trip_fields(segment, stops);
    Event::TripEnd {
        from_coordinates,
        to_coordinates,
        distance,
        from_stop,
        to_stop,
    }
}

/// Position report along the current trip segment.
///
/// Travelled and remaining distances are computed by scanning the segment
/// and flipping once the point is reached; both are `-1` when no segment is
/// supplied, meaning "distance unknown" rather than zero.
pub fn geo_position(point: &Coordinate, segment: Option<&[Coordinate]>) -> Event {
    let mut travelled = -1.0;
    let mut remaining = -1.0;

    if let Some(segment) = segment.filter(|segment| !segment.is_empty()) {
        travelled = 0.0;
        remaining = 0.0;
        let mut reached = false;
        for pair in segment.windows(2) {
            if pair[0] == *point {
                reached = true;
            }
            let leg = distance_km(&pair[0], &pair[1]);
            if reached {
                remaining += leg;
            } else {
                travelled += leg;
            }
        }
    }

    Event::GeoPosition {
        coordinates: point.bare(),
        distance_travelled: travelled,
        distance_remaining: remaining,
        properties: point.properties.clone(),
    }
}

pub fn door_open() -> Event {
    Event::DoorOpen
}

pub fn door_close() -> Event {
    Event::DoorClose
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn segment() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.5),
            Coordinate::new(0.0, 1.0),
        ]
    }

    #[test]
    fn route_info_sums_leg_distances() {
        let route = segment();
        let stops = vec![Stop::new("North", route[2].clone())];

        let Event::RouteInfo {
            coordinates,
            stops: listed,
            distance,
        } = route_info(&route, &stops)
        else {
            panic!("expected route_info");
        };

        assert_eq!(coordinates, route);
        assert_eq!(listed.len(), 1);
        // One degree of latitude, in kilometers.
        assert_relative_eq!(distance, 111.195, epsilon = 0.001);
    }

    #[test]
    fn trip_events_attach_matching_stops() {
        let segment = segment();
        let stops = vec![
            Stop::new("Origin", segment[0].clone()),
            Stop::new("North", segment[2].clone()),
        ];

        let Event::TripStart {
            from_coordinates,
            to_coordinates,
            from_stop,
            to_stop,
            distance,
        } = trip_start(&segment, &stops)
        else {
            panic!("expected trip_start");
        };

        assert_eq!(from_coordinates, segment[0]);
        assert_eq!(to_coordinates, segment[2]);
        assert_eq!(from_stop.map(|s| s.name), Some("Origin".into()));
        assert_eq!(to_stop.map(|s| s.name), Some("North".into()));
        assert!(distance > 0.0);

        // A mid-path endpoint has no stop record, and that is fine.
        let Event::TripEnd {
            from_stop, to_stop, ..
        } = trip_end(&segment[1..], &stops)
        else {
            panic!("expected trip_end");
        };
        assert!(from_stop.is_none());
        assert_eq!(to_stop.map(|s| s.name), Some("North".into()));
    }

    #[test]
    fn position_splits_travelled_and_remaining() {
        let segment = segment();

        let Event::GeoPosition {
            distance_travelled,
            distance_remaining,
            ..
        } = geo_position(&segment[1], Some(&segment))
        else {
            panic!("expected geo_position");
        };

        let half = 111.195 / 2.0;
        assert_relative_eq!(distance_travelled, half, epsilon = 0.01);
        assert_relative_eq!(distance_remaining, half, epsilon = 0.01);
    }

    #[test]
    fn position_without_segment_reports_unknown_distances() {
        let point = Coordinate::new(1.0, 1.0);

        for segment in [None, Some(&[][..])] {
            let Event::GeoPosition {
                distance_travelled,
                distance_remaining,
                ..
            } = geo_position(&point, segment)
            else {
                panic!("expected geo_position");
            };
            assert_eq!(distance_travelled, -1.0);
            assert_eq!(distance_remaining, -1.0);
        }
    }

    #[test]
    fn position_carries_metadata_next_to_bare_coordinates() {
        let mut point = Coordinate::new(1.0, 1.0);
        point.properties = Some(Map::from_iter([("heading".into(), json!(270))]));

        let value = serde_json::to_value(geo_position(&point, None)).unwrap();
        assert_eq!(value["type"], json!("geo_position"));
        assert_eq!(value["coordinates"], json!([1.0, 1.0]));
        assert_eq!(value["properties"]["heading"], json!(270));
    }

    #[test]
    fn door_events_are_tag_only() {
        assert_eq!(
            serde_json::to_value(door_open()).unwrap(),
            json!({ "type": "door_open" })
        );
        assert_eq!(
            serde_json::to_value(door_close()).unwrap(),
            json!({ "type": "door_close" })
        );
    }
}
