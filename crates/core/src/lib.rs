//! # shuttle-sim-core
//!
//! Path construction and event modelling for a simulated shuttle.
//!
//! ## Features
//!
//! - **Great-circle geodesics**: haversine distances and spherical
//!   interpolation between waypoints
//! - **Path building**: expand a sparse waypoint route into a dense travel
//!   path, then thin it under a precision budget without ever dropping a stop
//! - **Trip segmentation**: slice the sub-path between two points of
//!   interest, including the wraparound leg of a looping route
//! - **Event model**: the typed telemetry payloads emitted while stepping
//!   through a path
//! - **Source parsing**: GeoJSON feature collections and plain route/stop
//!   documents
//!
//! ## Example
//!
//! ```
//! use shuttle_sim_core::prelude::*;
//!
//! let route = vec![
//!     Coordinate::new(-92.466717, 44.021788),
//!     Coordinate::new(-92.466556, 44.022986),
//! ];
//!
//! // Expand to roughly one point every third of a meter, then keep one
//! // point every 5 meters of arc.
//! let path = build_path(&route, &[], 5.0);
//! assert_eq!(path.first(), route.first());
//! assert_eq!(path.last(), route.last());
//! ```

pub mod coordinate;
pub mod event;
pub mod geodesy;
pub mod path;
pub mod source;
pub mod stop;
pub mod trip;

// Re-exports for convenience
pub mod prelude {
    pub use crate::coordinate::Coordinate;
    pub use crate::event::{self, Event};
    pub use crate::geodesy::{
        central_angle, distance_km, distance_meters, interpolate, EARTH_RADIUS_METERS,
    };
    pub use crate::path::{build_path, coordinate_index, decimate, densify, stop_index};
    pub use crate::source::{resolve_sources, SourceDocument, SourceError};
    pub use crate::stop::Stop;
    pub use crate::trip::{segment_between, trip_segment};
}

pub use prelude::*;
