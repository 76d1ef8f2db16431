//! Coordinate snapping onto the road graph
//!
//! Every original arc is split into its shape pieces and indexed in an R-tree.
//! A query scans the pieces inside a search box and keeps the closest
//! projection.

use rstar::{RTree, RTreeObject, AABB};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::geo::{haversine_distance, project_onto_segment};
use crate::graph::{Coordinate, Direction, EdgeData, Graph, RoadEdge, VertexId, Weight};

use super::visit::VisitList;

/// Snaps closer than this to an endpoint resolve to the vertex itself
pub const VERTEX_TOLERANCE_M: f64 = 0.5;

/// One straight piece of an arc's geometry
#[derive(Clone, Debug, PartialEq)]
struct IndexedPiece {
    a: Coordinate,
    b: Coordinate,
    from: VertexId,
    to: VertexId,
    weight: Weight,
    reverse_weight: Option<Weight>,
    /// Fraction of the arc length at `a` and at `b`
    start: f64,
    end: f64,
    /// Arc length in metres
    length_m: f64,
}

impl RTreeObject for IndexedPiece {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.a.lon(), self.a.lat()], [self.b.lon(), self.b.lat()])
    }
}

/// Query point projected onto an arc interior
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnap {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: Weight,
    /// Weight of the opposite arc `to → from`, if the road is two-way
    pub reverse_weight: Option<Weight>,
    /// Relative position along the arc in [0, 1]
    pub position: f64,
    pub point: Coordinate,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snap {
    Vertex(VertexId),
    Edge(EdgeSnap),
}

fn portion(weight: Weight, fraction: f64) -> Weight {
    (weight as f64 * fraction).round() as Weight
}

impl Snap {
    /// Entries for leaving the snapped point
    pub fn as_source(&self) -> VisitList {
        match self {
            Snap::Vertex(v) => VisitList::single(*v),
            Snap::Edge(e) => {
                let mut entries = vec![(e.to, portion(e.weight, 1.0 - e.position))];
                if let Some(rw) = e.reverse_weight {
                    entries.push((e.from, portion(rw, e.position)));
                }
                VisitList::from_entries(entries)
            }
        }
    }

    /// Entries for arriving at the snapped point
    pub fn as_target(&self) -> VisitList {
        match self {
            Snap::Vertex(v) => VisitList::single(*v),
            Snap::Edge(e) => {
                let mut entries = vec![(e.from, portion(e.weight, e.position))];
                if let Some(rw) = e.reverse_weight {
                    entries.push((e.to, portion(rw, 1.0 - e.position)));
                }
                VisitList::from_entries(entries)
            }
        }
    }
}

/// R-tree over the original arcs of a road graph
pub struct SpatialIndex {
    tree: RTree<IndexedPiece>,
}

impl SpatialIndex {
    /// Index every original arc, whether it survives in a forward list or
    /// only in a contracted vertex's backward list
    pub fn build(graph: &Graph<RoadEdge>) -> Self {
        let mut seen: FxHashSet<(VertexId, VertexId, Weight)> = FxHashSet::default();
        let mut arcs: Vec<(VertexId, VertexId, &RoadEdge)> = Vec::new();

        for vertex in graph.vertices() {
            for direction in [Direction::Forward, Direction::Backward] {
                for n in vertex.neighbours(direction) {
                    if n.edge.is_shortcut() {
                        continue;
                    }
                    let (from, to) = match direction {
                        Direction::Forward => (vertex.id, n.target),
                        Direction::Backward => (n.target, vertex.id),
                    };
                    if seen.insert((from, to, n.weight())) {
                        arcs.push((from, to, &n.edge));
                    }
                }
            }
        }

        let mut cheapest: FxHashMap<(VertexId, VertexId), Weight> = FxHashMap::default();
        for &(from, to, edge) in &arcs {
            let w = cheapest.entry((from, to)).or_insert(edge.weight);
            *w = (*w).min(edge.weight);
        }
        let reverse_weight = |from: VertexId, to: VertexId| cheapest.get(&(to, from)).copied();

        let mut pieces = Vec::new();
        for &(from, to, edge) in &arcs {
            let mut points = Vec::with_capacity(edge.shape.len() + 2);
            points.push(graph.vertex(from).coord);
            points.extend_from_slice(&edge.shape);
            points.push(graph.vertex(to).coord);

            let lengths: Vec<f64> = points
                .windows(2)
                .map(|w| haversine_distance(w[0].lat(), w[0].lon(), w[1].lat(), w[1].lon()))
                .collect();
            let total: f64 = lengths.iter().sum();
            let rw = reverse_weight(from, to);

            let mut walked = 0.0;
            for (w, len) in points.windows(2).zip(&lengths) {
                let (start, end) = if total > 0.0 {
                    (walked / total, (walked + len) / total)
                } else {
                    (0.0, 0.0)
                };
                walked += len;
                pieces.push(IndexedPiece {
                    a: w[0],
                    b: w[1],
                    from,
                    to,
                    weight: edge.weight,
                    reverse_weight: rw,
                    start,
                    end,
                    length_m: total,
                });
            }
        }

        tracing::debug!(arcs = arcs.len(), pieces = pieces.len(), "spatial index built");

        Self {
            tree: RTree::bulk_load(pieces),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest vertex or arc point within `half_width_deg` of `coord`
    pub fn resolve(&self, coord: Coordinate, half_width_deg: f64) -> Option<Snap> {
        let (lon, lat) = (coord.lon(), coord.lat());
        let envelope = AABB::from_corners(
            [lon - half_width_deg, lat - half_width_deg],
            [lon + half_width_deg, lat + half_width_deg],
        );

        let mut best: Option<(f64, &IndexedPiece, f64, Coordinate)> = None;
        for piece in self.tree.locate_in_envelope_intersecting(&envelope) {
            let proj = project_onto_segment(coord, piece.a, piece.b);
            let closer = best.as_ref().map_or(true, |(d, p, _, _)| {
                proj.distance_m < *d
                    || (proj.distance_m == *d && (piece.from, piece.to) < (p.from, p.to))
            });
            if closer {
                let position = piece.start + proj.position * (piece.end - piece.start);
                best = Some((proj.distance_m, piece, position, proj.point));
            }
        }

        let (distance_m, piece, position, point) = best?;
        if position * piece.length_m <= VERTEX_TOLERANCE_M {
            return Some(Snap::Vertex(piece.from));
        }
        if (1.0 - position) * piece.length_m <= VERTEX_TOLERANCE_M {
            return Some(Snap::Vertex(piece.to));
        }

        Some(Snap::Edge(EdgeSnap {
            from: piece.from,
            to: piece.to,
            weight: piece.weight,
            reverse_weight: piece.reverse_weight,
            position,
            point,
            distance_m,
        }))
    }
}
