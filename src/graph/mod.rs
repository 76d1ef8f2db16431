//! Weighted directed graph store
//!
//! Every vertex owns a forward list (arcs leaving it) and a backward list
//! (arcs entering it). While both endpoints are uncontracted an arc `a → b`
//! is held twice: in `a.forward` and, mirrored, in `b.backward`. Once a vertex
//! is contracted its own lists are frozen and only point to higher levels.

mod tags;

pub use tags::{TagCollection, TagStore};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Dense vertex identifier (index into the store)
pub type VertexId = u32;
/// Arc weight (decimetres for ingested road graphs)
pub type Weight = u32;
/// Contraction rank
pub type Level = u32;
/// Tag collection identifier
pub type TagId = u32;

/// Level of a vertex that has not been contracted yet
pub const UNCONTRACTED: Level = u32::MAX;
/// Sentinel weight for unreachable targets
pub const UNREACHABLE: Weight = u32::MAX;

/// Fixed-point scale for coordinates (1e-7 degrees)
const SCALE: f64 = 1e7;

/// Latitude/longitude in fixed-point 1e-7 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coordinate {
    pub lat_fxp: i32,
    pub lon_fxp: i32,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_fxp: (lat * SCALE).round() as i32,
            lon_fxp: (lon * SCALE).round() as i32,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat_fxp as f64 / SCALE
    }

    pub fn lon(&self) -> f64 {
        self.lon_fxp as f64 / SCALE
    }
}

/// Search / adjacency direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow arcs from tail to head (source-to-target searches)
    Forward,
    /// Follow arcs from head to tail
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Payload carried by every neighbour entry.
///
/// The graph store, the search engine and the preprocessor are generic over
/// it; they only need the weight and the shortcut bookkeeping.
pub trait EdgeData: Clone + std::fmt::Debug + Send + Sync {
    fn weight(&self) -> Weight;

    /// Vertex whose contraction produced this arc, `None` for original arcs
    fn contracted_vertex(&self) -> Option<VertexId>;

    /// Build the payload of a shortcut bypassing `via`
    fn shortcut(weight: Weight, via: VertexId) -> Self;

    fn is_shortcut(&self) -> bool {
        self.contracted_vertex().is_some()
    }
}

/// Arc payload of road graphs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoadEdge {
    pub weight: Weight,
    pub via: Option<VertexId>,
    pub tag: Option<TagId>,
    /// Intermediate geometry between the two endpoints
    pub shape: Vec<Coordinate>,
}

impl RoadEdge {
    pub fn new(weight: Weight) -> Self {
        Self {
            weight,
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: TagId) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_shape(mut self, shape: Vec<Coordinate>) -> Self {
        self.shape = shape;
        self
    }
}

impl EdgeData for RoadEdge {
    fn weight(&self) -> Weight {
        self.weight
    }

    fn contracted_vertex(&self) -> Option<VertexId> {
        self.via
    }

    fn shortcut(weight: Weight, via: VertexId) -> Self {
        Self {
            weight,
            via: Some(via),
            tag: None,
            shape: Vec::new(),
        }
    }
}

/// One entry of a forward or backward list
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour<E> {
    pub target: VertexId,
    pub edge: E,
}

impl<E: EdgeData> Neighbour<E> {
    pub fn new(target: VertexId, edge: E) -> Self {
        Self { target, edge }
    }

    pub fn weight(&self) -> Weight {
        self.edge.weight()
    }

    pub fn contracted_vertex(&self) -> Option<VertexId> {
        self.edge.contracted_vertex()
    }
}

#[derive(Debug, Clone)]
pub struct Vertex<E> {
    pub id: VertexId,
    pub coord: Coordinate,
    pub level: Level,
    pub forward: Vec<Neighbour<E>>,
    pub backward: Vec<Neighbour<E>>,
}

impl<E> Vertex<E> {
    pub fn is_contracted(&self) -> bool {
        self.level != UNCONTRACTED
    }

    pub fn neighbours(&self, direction: Direction) -> &[Neighbour<E>] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    fn neighbours_mut(&mut self, direction: Direction) -> &mut Vec<Neighbour<E>> {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
        }
    }
}

/// Vertex/arc store shared by ingestion, preprocessing, search and persistence
#[derive(Debug, Clone)]
pub struct Graph<E = RoadEdge> {
    vertices: Vec<Vertex<E>>,
    tags: TagStore,
}

impl<E: EdgeData> Default for Graph<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EdgeData> Graph<E> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            tags: TagStore::default(),
        }
    }

    pub fn with_capacity(n_vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(n_vertices),
            tags: TagStore::default(),
        }
    }

    /// Add an uncontracted vertex and return its id
    pub fn add_vertex(&mut self, coord: Coordinate) -> VertexId {
        let id = self.vertices.len() as VertexId;
        self.vertices.push(Vertex {
            id,
            coord,
            level: UNCONTRACTED,
            forward: Vec::new(),
            backward: Vec::new(),
        });
        id
    }

    /// Add an arc `from → to`, keeping both neighbour lists in sync
    pub fn add_arc(&mut self, from: VertexId, to: VertexId, edge: E) -> Result<()> {
        if self.get(from).is_none() || self.get(to).is_none() {
            return Err(Error::InvalidInput(format!(
                "arc {} → {} references an unknown vertex ({} vertices)",
                from,
                to,
                self.vertices.len()
            )));
        }
        if from == to {
            return Err(Error::InvalidInput(format!("arc {} → {} is a self-loop", from, to)));
        }
        let mirror = edge.clone();
        self.vertices[from as usize].forward.push(Neighbour::new(to, edge));
        self.vertices[to as usize].backward.push(Neighbour::new(from, mirror));
        Ok(())
    }

    /// Push a single list entry without its mirror (used by the loader)
    pub(crate) fn push_entry(
        &mut self,
        owner: VertexId,
        direction: Direction,
        neighbour: Neighbour<E>,
    ) {
        self.vertices[owner as usize]
            .neighbours_mut(direction)
            .push(neighbour);
    }

    /// Remove every entry of `owner`'s list in `direction` that points at
    /// `target`; returns how many were removed
    pub(crate) fn remove_entries(
        &mut self,
        owner: VertexId,
        direction: Direction,
        target: VertexId,
    ) -> usize {
        let list = self.vertices[owner as usize].neighbours_mut(direction);
        let before = list.len();
        list.retain(|n| n.target != target);
        before - list.len()
    }

    pub(crate) fn set_level(&mut self, id: VertexId, level: Level) {
        self.vertices[id as usize].level = level;
    }

    /// Vertex by id; panics on an id this store never handed out
    pub fn vertex(&self, id: VertexId) -> &Vertex<E> {
        &self.vertices[id as usize]
    }

    pub fn get(&self, id: VertexId) -> Option<&Vertex<E>> {
        self.vertices.get(id as usize)
    }

    pub fn neighbours(&self, id: VertexId, direction: Direction) -> &[Neighbour<E>] {
        self.vertices[id as usize].neighbours(direction)
    }

    pub fn level(&self, id: VertexId) -> Level {
        self.vertices[id as usize].level
    }

    pub fn is_contracted(&self, id: VertexId) -> bool {
        self.vertices[id as usize].is_contracted()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<E>> {
        self.vertices.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = VertexId> {
        0..self.vertices.len() as VertexId
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of forward-list entries (each arc counted once from its tail)
    pub fn arc_count(&self) -> usize {
        self.vertices.iter().map(|v| v.forward.len()).sum()
    }

    pub fn shortcut_count(&self) -> usize {
        self.vertices
            .iter()
            .flat_map(|v| v.forward.iter().chain(v.backward.iter()))
            .filter(|n| n.edge.is_shortcut())
            .count()
    }

    /// Cheapest arc `from → to` among `from`'s forward entries
    pub fn arc_weight(&self, from: VertexId, to: VertexId) -> Option<Weight> {
        self.vertices[from as usize]
            .forward
            .iter()
            .filter(|n| n.target == to)
            .map(|n| n.weight())
            .min()
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagStore {
        &mut self.tags
    }

    /// Check the neighbour-list invariants.
    ///
    /// Between two uncontracted vertices every forward entry has a matching
    /// backward entry (same weight and shortcut id) and vice versa. An
    /// uncontracted vertex never points at a contracted one, and a contracted
    /// vertex only points at higher levels.
    pub fn check_symmetry(&self) -> std::result::Result<(), String> {
        let mut balance: FxHashMap<(VertexId, VertexId, Weight, Option<VertexId>), i64> =
            FxHashMap::default();
        let mut violations = Vec::new();

        for vertex in &self.vertices {
            for direction in [Direction::Forward, Direction::Backward] {
                for n in vertex.neighbours(direction) {
                    let Some(other) = self.get(n.target) else {
                        violations.push(format!(
                            "{} points at unknown vertex {}",
                            vertex.id, n.target
                        ));
                        continue;
                    };

                    if vertex.is_contracted() {
                        if other.level <= vertex.level {
                            violations.push(format!(
                                "contracted {} (level {}) points down at {} (level {})",
                                vertex.id, vertex.level, other.id, other.level
                            ));
                        }
                        continue;
                    }

                    if other.is_contracted() {
                        violations.push(format!(
                            "uncontracted {} still points at contracted {}",
                            vertex.id, other.id
                        ));
                        continue;
                    }

                    let (tail, head, delta) = match direction {
                        Direction::Forward => (vertex.id, n.target, 1),
                        Direction::Backward => (n.target, vertex.id, -1),
                    };
                    *balance
                        .entry((tail, head, n.weight(), n.contracted_vertex()))
                        .or_insert(0) += delta;
                }
            }
        }

        for ((tail, head, weight, via), count) in balance {
            if count != 0 {
                violations.push(format!(
                    "arc {} → {} (weight {}, via {:?}) unbalanced by {}",
                    tail, head, weight, via, count
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            violations.sort();
            Err(format!(
                "{} symmetry violations, first: {}",
                violations.len(),
                violations[0]
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Graph {
        let mut g = Graph::new();
        let a = g.add_vertex(Coordinate::new(50.0, 4.0));
        let b = g.add_vertex(Coordinate::new(50.0, 4.001));
        let c = g.add_vertex(Coordinate::new(50.001, 4.001));
        g.add_arc(a, b, RoadEdge::new(1)).unwrap();
        g.add_arc(b, c, RoadEdge::new(1)).unwrap();
        g.add_arc(a, c, RoadEdge::new(5)).unwrap();
        g
    }

    #[test]
    fn test_coordinate_fixed_point() {
        let c = Coordinate::new(50.8503396, 4.3517103);
        assert_eq!(c.lat_fxp, 508_503_396);
        assert_eq!(c.lon_fxp, 43_517_103);
        assert!((c.lat() - 50.8503396).abs() < 1e-9);
    }

    #[test]
    fn test_add_arc_rejects_self_loop() {
        let mut g = diamond();
        let err = g.add_arc(1, 1, RoadEdge::new(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("self-loop"));
        assert_eq!(g.arc_count(), 3);
        assert!(g.check_symmetry().is_ok());
    }

    #[test]
    fn test_add_arc_mirrors_entry() {
        let g = diamond();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.arc_count(), 3);
        assert_eq!(g.neighbours(0, Direction::Forward).len(), 2);
        assert_eq!(g.neighbours(2, Direction::Backward).len(), 2);
        assert_eq!(g.arc_weight(0, 2), Some(5));
        assert_eq!(g.arc_weight(2, 0), None);
        assert!(g.check_symmetry().is_ok());
    }

    #[test]
    fn test_add_arc_unknown_vertex() {
        let mut g = diamond();
        assert!(matches!(
            g.add_arc(0, 9, RoadEdge::new(1)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mirror_keeps_shape() {
        let mut g: Graph = Graph::new();
        let a = g.add_vertex(Coordinate::new(0.0, 0.0));
        let b = g.add_vertex(Coordinate::new(0.0, 1.0));
        let edge = RoadEdge::new(3).with_shape(vec![Coordinate::new(0.0, 0.5)]);
        g.add_arc(a, b, edge).unwrap();
        assert_eq!(g.neighbours(a, Direction::Forward)[0].edge.shape.len(), 1);
        assert_eq!(g.neighbours(b, Direction::Backward)[0].edge.shape.len(), 1);
        assert!(g.check_symmetry().is_ok());
    }

    #[test]
    fn test_check_symmetry_detects_missing_mirror() {
        let mut g = diamond();
        g.remove_entries(2, Direction::Backward, 0);
        let err = g.check_symmetry().unwrap_err();
        assert!(err.contains("unbalanced"), "{}", err);
    }

    #[test]
    fn test_check_symmetry_detects_weight_mismatch() {
        let mut g = diamond();
        g.remove_entries(1, Direction::Backward, 0);
        g.push_entry(1, Direction::Backward, Neighbour::new(0, RoadEdge::new(7)));
        assert!(g.check_symmetry().is_err());
    }

    #[test]
    fn test_contracted_vertex_must_point_up() {
        let mut g = diamond();
        g.set_level(1, 1);
        g.remove_entries(0, Direction::Forward, 1);
        g.remove_entries(2, Direction::Backward, 1);
        assert!(g.check_symmetry().is_ok());

        // Contract c below b: b's entry towards c now points down
        g.set_level(2, 0);
        assert!(g.check_symmetry().is_err());
    }
}
