//! Named points of interest where the vehicle dwells.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A named stop on the route.
///
/// Stops keep the order they were configured in; the stop after the last one
/// is the first one again (looping service). A stop is only reachable if its
/// coordinates coincide with a point on the travel path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "poi", default, skip_serializing_if = "Option::is_none")]
    pub point_of_interest: Option<bool>,
    pub coordinates: Coordinate,
}

impl Stop {
    pub fn new(name: impl Into<String>, coordinates: Coordinate) -> Self {
        Self {
            name: name.into(),
            description: None,
            point_of_interest: None,
            coordinates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_uses_poi_and_omits_empty_fields() {
        let mut stop = Stop::new("Depot", Coordinate::new(-92.5, 44.0));
        assert_eq!(
            serde_json::to_value(&stop).unwrap(),
            json!({ "name": "Depot", "coordinates": [-92.5, 44.0] })
        );

        stop.point_of_interest = Some(true);
        stop.description = Some("Main terminal".into());
        let value = serde_json::to_value(&stop).unwrap();
        assert_eq!(value["poi"], json!(true));
        assert_eq!(value["description"], json!("Main terminal"));
    }
}
