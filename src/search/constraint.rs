//! Constraint sequences consulted before relaxing an arc
//!
//! Every frontier vertex carries the run-length compressed sequence of labels
//! met on the way from the search origin. A [`Constraint`] decides whether the
//! next arc's label may be appended.

use crate::graph::{Graph, Neighbour, RoadEdge, VertexId};

/// Classification token of one arc
pub type Label = u8;

pub trait Constraint<E>: Send + Sync {
    /// Label of the arc from `tail` described by `neighbour`
    fn label(&self, graph: &Graph<E>, tail: VertexId, neighbour: &Neighbour<E>) -> Label;

    /// May a path whose compressed labels are `sequence` continue on an arc
    /// labelled `next`?
    fn permits(&self, sequence: &[Label], next: Label) -> bool;
}

/// Append `next` unless it repeats the last label
pub fn extend_sequence(sequence: &[Label], next: Label) -> Vec<Label> {
    let mut extended = Vec::with_capacity(sequence.len() + 1);
    extended.extend_from_slice(sequence);
    if sequence.last() != Some(&next) {
        extended.push(next);
    }
    extended
}

/// Public road
pub const ACCESS_PUBLIC: Label = 0;
/// Destination-only road (`access=destination|private|delivery`)
pub const ACCESS_DESTINATION: Label = 1;

/// No through traffic: destination-only roads may only be used at the start
/// and at the end of a route, never crossed in the middle.
///
/// Valid compressed sequences are the subsequences of
/// `destination, public, destination`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThroughTraffic;

impl Constraint<RoadEdge> for NoThroughTraffic {
    fn label(
        &self,
        graph: &Graph<RoadEdge>,
        _tail: VertexId,
        neighbour: &Neighbour<RoadEdge>,
    ) -> Label {
        let restricted = neighbour
            .edge
            .tag
            .and_then(|tag| graph.tags().get(tag, "access"))
            .map(|access| matches!(access, "destination" | "private" | "delivery"))
            .unwrap_or(false);
        if restricted {
            ACCESS_DESTINATION
        } else {
            ACCESS_PUBLIC
        }
    }

    fn permits(&self, sequence: &[Label], next: Label) -> bool {
        let extended = extend_sequence(sequence, next);
        match extended.len() {
            0..=2 => true,
            3 => extended[0] == ACCESS_DESTINATION,
            _ => false,
        }
    }
}
