//! Path segments kept in an arena and addressed by index
//!
//! A search pushes one segment per improved label; a settled vertex's
//! segment chain leads back to the search origin.

use serde::Serialize;

use crate::graph::{VertexId, Weight};

/// Index of a segment inside a [`PathArena`]
pub type SegmentId = u32;

/// Immutable node of a path chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    pub vertex: VertexId,
    /// Cumulative weight from the virtual source
    pub weight: Weight,
    pub prev: Option<SegmentId>,
}

#[derive(Debug, Default)]
pub struct PathArena {
    segments: Vec<PathSegment>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, vertex: VertexId, weight: Weight, prev: Option<SegmentId>) -> SegmentId {
        let id = self.segments.len() as SegmentId;
        self.segments.push(PathSegment {
            vertex,
            weight,
            prev,
        });
        id
    }

    pub fn segment(&self, id: SegmentId) -> &PathSegment {
        &self.segments[id as usize]
    }

    /// Segments from `id` back to the search origin
    pub fn walk(&self, id: SegmentId) -> impl Iterator<Item = &PathSegment> {
        std::iter::successors(Some(self.segment(id)), move |s| s.prev.map(|p| self.segment(p)))
    }

    /// Vertices from the search origin to `id`
    pub fn vertices_to(&self, id: SegmentId) -> Vec<VertexId> {
        let mut vertices: Vec<VertexId> = self.walk(id).map(|s| s.vertex).collect();
        vertices.reverse();
        vertices
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A resolved route: vertex sequence in travel order and its total weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    pub vertices: Vec<VertexId>,
    pub weight: Weight,
}

impl Path {
    pub fn source(&self) -> Option<VertexId> {
        self.vertices.first().copied()
    }

    pub fn target(&self) -> Option<VertexId> {
        self.vertices.last().copied()
    }

    /// Concatenate `source → meeting` with the reverse of `target → meeting`.
    ///
    /// Both halves must end at the same meeting vertex, which appears once
    /// in the result.
    pub fn join(forward: Path, backward: Path) -> Path {
        debug_assert_eq!(forward.target(), backward.target());
        let mut vertices = forward.vertices;
        vertices.extend(backward.vertices.iter().rev().skip(1));
        Path {
            vertices,
            weight: forward.weight.saturating_add(backward.weight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_walk_back_to_origin() {
        let mut arena = PathArena::new();
        let a = arena.push(10, 0, None);
        let b = arena.push(11, 4, Some(a));
        let c = arena.push(12, 9, Some(b));
        // Branch sharing the prefix
        let d = arena.push(13, 6, Some(b));

        assert_eq!(arena.vertices_to(c), vec![10, 11, 12]);
        assert_eq!(arena.vertices_to(d), vec![10, 11, 13]);
        let weights: Vec<Weight> = arena.walk(c).map(|s| s.weight).collect();
        assert_eq!(weights, vec![9, 4, 0]);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn test_join_shares_meeting_vertex() {
        let forward = Path {
            vertices: vec![1, 2, 3],
            weight: 5,
        };
        let backward = Path {
            vertices: vec![7, 6, 3],
            weight: 4,
        };
        let joined = Path::join(forward, backward);
        assert_eq!(joined.vertices, vec![1, 2, 3, 6, 7]);
        assert_eq!(joined.weight, 9);
        assert_eq!(joined.source(), Some(1));
        assert_eq!(joined.target(), Some(7));
    }
}
