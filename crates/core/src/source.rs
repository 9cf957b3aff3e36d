//! Parsing of route and stop source documents.
//!
//! Two shapes are accepted:
//!
//! - a GeoJSON `FeatureCollection`, where Point features become waypoints
//!   (with the feature `properties` attached) and LineString features
//!   contribute their coordinate runs; in a stops document each Point
//!   feature's properties plus geometry become a [`Stop`]
//! - a plain JSON object carrying a `routeCoordinates` array and/or a
//!   `stops` map keyed by stop name
//!
//! Fetching the documents is the caller's concern; everything here is pure.

use geojson::{FeatureCollection, GeoJson, Value as Geometry};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::coordinate::Coordinate;
use crate::stop::Stop;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid source document: {0}")]
    Parse(String),
    #[error("route and stops sources not found")]
    MissingSources,
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// A parsed source document whose shape has not yet been interpreted as a
/// route or a stop list.
#[derive(Debug)]
pub enum SourceDocument {
    Features(FeatureCollection),
    Plain(PlainDocument),
}

/// The non-GeoJSON document shape.
#[derive(Debug, Deserialize)]
pub struct PlainDocument {
    #[serde(rename = "routeCoordinates", default)]
    pub route_coordinates: Option<Vec<Coordinate>>,
    #[serde(default, deserialize_with = "ordered_stop_map")]
    pub stops: Option<Vec<(String, PlainStop)>>,
}

#[derive(Debug, Deserialize)]
pub struct PlainStop {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poi: Option<bool>,
    pub coordinates: Coordinate,
}

/// Deserialize the stop map preserving document order, which defines the
/// order the vehicle visits the stops in.
fn ordered_stop_map<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<(String, PlainStop)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StopMapVisitor;

    impl<'de> Visitor<'de> for StopMapVisitor {
        type Value = Vec<(String, PlainStop)>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a map of stop name to stop definition")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut stops = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                stops.push(entry);
            }
            Ok(stops)
        }
    }

    deserializer.deserialize_map(StopMapVisitor).map(Some)
}

impl SourceDocument {
    /// Parse raw JSON into one of the accepted document shapes.
    ///
    /// Anything that is valid JSON but matches neither shape parses as an
    /// empty plain document; only malformed JSON is an error.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.parse::<GeoJson>() {
            Ok(GeoJson::FeatureCollection(collection)) => Ok(Self::Features(collection)),
            _ => serde_json::from_str::<PlainDocument>(raw)
                .map(Self::Plain)
                .map_err(|err| SourceError::Parse(err.to_string())),
        }
    }

    /// Waypoint coordinates carried by this document, if it carries any.
    pub fn route_coordinates(&self) -> Option<Vec<Coordinate>> {
        match self {
            Self::Features(collection) => {
                let mut coordinates = Vec::new();
                for feature in &collection.features {
                    match feature.geometry.as_ref().map(|g| &g.value) {
                        Some(Geometry::Point(position)) => {
                            if let Some(mut point) = Coordinate::from_position(position) {
                                point.properties = feature.properties.clone();
                                coordinates.push(point);
                            }
                        }
                        Some(Geometry::LineString(positions)) => {
                            coordinates
                                .extend(positions.iter().filter_map(|p| Coordinate::from_position(p)));
                        }
                        _ => {}
                    }
                }
                Some(coordinates)
            }
            Self::Plain(document) => document.route_coordinates.clone(),
        }
    }

    /// Stop records carried by this document, if it carries any.
    pub fn stops(&self) -> Option<Vec<Stop>> {
        match self {
            Self::Features(collection) => {
                let stops = collection
                    .features
                    .iter()
                    .filter_map(|feature| {
                        let Some(Geometry::Point(position)) =
                            feature.geometry.as_ref().map(|g| &g.value)
                        else {
                            return None;
                        };
                        let coordinates = Coordinate::from_position(position)?;
                        let properties = feature.properties.clone().unwrap_or_default();
                        Some(Stop {
                            name: properties
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            description: properties
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            point_of_interest: properties.get("poi").and_then(Value::as_bool),
                            coordinates,
                        })
                    })
                    .collect();
                Some(stops)
            }
            Self::Plain(document) => document.stops.as_ref().map(|stops| {
                stops
                    .iter()
                    .map(|(name, stop)| Stop {
                        name: name.clone(),
                        description: stop.description.clone(),
                        point_of_interest: stop.poi,
                        coordinates: stop.coordinates.clone(),
                    })
                    .collect()
            }),
        }
    }
}

/// Combine the two optional source documents into the route and stop list.
///
/// Either document alone is enough: a stops document may carry the route
/// coordinates as well. Absence of both is the only fatal case.
pub fn resolve_sources(
    route: Option<SourceDocument>,
    stops: Option<SourceDocument>,
) -> Result<(Vec<Coordinate>, Vec<Stop>)> {
    if route.is_none() && stops.is_none() {
        return Err(SourceError::MissingSources);
    }

    let route_coordinates = route
        .as_ref()
        .and_then(SourceDocument::route_coordinates)
        .or_else(|| stops.as_ref().and_then(SourceDocument::route_coordinates))
        .unwrap_or_default();
    let stop_list = stops
        .as_ref()
        .and_then(SourceDocument::stops)
        .unwrap_or_default();

    debug!(
        waypoints = route_coordinates.len(),
        stops = stop_list.len(),
        "resolved route and stop sources"
    );
    Ok((route_coordinates, stop_list))
}
