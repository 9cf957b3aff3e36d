//! Trip segmentation: the sub-path actively traversed between two points of
//! interest.

use crate::coordinate::Coordinate;
use crate::path::coordinate_index;

/// Slice the travel path between two resolved indices, inclusive.
///
/// A destination of `None` or index 0 means the trip ends at the logical
/// start of a looping route: the segment then runs from the origin to the
/// end of the path with the path's first point appended, mirroring how the
/// stop after the last stop is the first stop again.
pub fn trip_segment(
    path: &[Coordinate],
    origin: usize,
    destination: Option<usize>,
) -> Vec<Coordinate> {
    if path.is_empty() {
        return Vec::new();
    }

    match destination {
        Some(dest) if dest > 0 => {
            let end = dest.min(path.len() - 1);
            if origin > end {
                Vec::new()
            } else {
                path[origin..=end].to_vec()
            }
        }
        _ => {
            let mut segment = path[origin.min(path.len())..].to_vec();
            segment.push(path[0].clone());
            segment
        }
    }
}

/// Segment between two coordinates taken from the path itself.
pub fn segment_between(
    path: &[Coordinate],
    origin: &Coordinate,
    destination: &Coordinate,
) -> Vec<Coordinate> {
    let origin_index = coordinate_index(path, origin).unwrap_or(0);
    let destination_index = coordinate_index(path, destination);
    trip_segment(path, origin_index, destination_index)
}
