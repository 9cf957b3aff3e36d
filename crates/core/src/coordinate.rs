//! The shared coordinate representation.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A geographic position: longitude and latitude in degrees, an optional
/// elevation, and optional attached metadata.
///
/// Route sources produce positions either as bare `[lng, lat]` /
/// `[lng, lat, elev]` arrays or as `{"coordinates": [...], "properties":
/// {...}}` objects. Both shapes deserialize into this one type, and
/// serialization reproduces the object shape only when metadata is attached,
/// so round-tripping a source document preserves its form.
#[derive(Debug, Clone, Default)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
    pub properties: Option<Map<String, Value>>,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            elevation: None,
            properties: None,
        }
    }

    /// Position from a GeoJSON-style `[lng, lat]` or `[lng, lat, elev]`
    /// slice; `None` when fewer than two components are present.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match *position {
            [longitude, latitude] => Some(Self::new(longitude, latitude)),
            [longitude, latitude, elevation, ..] => Some(Self {
                longitude,
                latitude,
                elevation: Some(elevation),
                properties: None,
            }),
            _ => None,
        }
    }

    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }

    /// The same position with metadata stripped.
    pub fn bare(&self) -> Self {
        Self {
            longitude: self.longitude,
            latitude: self.latitude,
            elevation: self.elevation,
            properties: None,
        }
    }

    fn position(&self) -> Vec<f64> {
        match self.elevation {
            Some(elevation) => vec![self.longitude, self.latitude, elevation],
            None => vec![self.longitude, self.latitude],
        }
    }
}

/// Two coordinates are equal when longitude and latitude match exactly;
/// elevation and metadata do not participate.
impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.longitude == other.longitude && self.latitude == other.latitude
    }
}

impl Serialize for Coordinate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.properties {
            Some(properties) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("coordinates", &self.position())?;
                map.serialize_entry("properties", properties)?;
                map.end()
            }
            None => {
                let position = self.position();
                let mut seq = serializer.serialize_seq(Some(position.len()))?;
                for component in &position {
                    seq.serialize_element(component)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Position(Vec<f64>),
            Tagged {
                coordinates: Vec<f64>,
                #[serde(default)]
                properties: Option<Map<String, Value>>,
            },
        }

        let (position, properties) = match Repr::deserialize(deserializer)? {
            Repr::Position(position) => (position, None),
            Repr::Tagged {
                coordinates,
                properties,
            } => (coordinates, properties),
        };

        let mut coordinate = Coordinate::from_position(&position).ok_or_else(|| {
            de::Error::invalid_length(position.len(), &"at least longitude and latitude")
        })?;
        coordinate.properties = properties;
        Ok(coordinate)
    }
}
