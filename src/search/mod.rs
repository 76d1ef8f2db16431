//! Plain shortest-path engine and coordinate resolution

mod closest;
mod constraint;
mod dijkstra;
mod path;
mod visit;

pub use closest::{EdgeSnap, Snap, SpatialIndex, VERTEX_TOLERANCE_M};
pub use constraint::{
    extend_sequence, Constraint, Label, NoThroughTraffic, ACCESS_DESTINATION, ACCESS_PUBLIC,
};
pub use dijkstra::{Dijkstra, Matrix, RangeResult, SearchConfig};
pub use path::{Path, PathArena, PathSegment, SegmentId};
pub use visit::VisitList;
