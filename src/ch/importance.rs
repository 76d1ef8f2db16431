//! Contraction order heuristics

use rustc_hash::{FxHashMap, FxHashSet};

use super::witness::{required_shortcuts, WitnessCalculator};
use crate::graph::{Direction, EdgeData, Graph, Level, VertexId};

/// Scores how cheap contracting a vertex is right now; lower goes first
pub trait ImportanceCalculator<E>: Send + Sync {
    fn calculate(&self, graph: &Graph<E>, level: Level, vertex: VertexId) -> f64;

    /// `vertex` has just been contracted
    fn notify_contracted(&mut self, graph: &Graph<E>, vertex: VertexId);
}

/// Edge difference plus contracted-neighbour count:
///
/// `(shortcuts_added - arcs_removed) + contracted_neighbours`
///
/// Shortcuts are counted with the same witness search the contraction uses.
/// The neighbour term grows as the area around a vertex gets contracted,
/// which spreads contractions uniformly over the graph.
#[derive(Debug, Clone, Default)]
pub struct EdgeDifference<W> {
    witness: W,
    contracted_neighbours: FxHashMap<VertexId, u32>,
}

impl<W> EdgeDifference<W> {
    pub fn new(witness: W) -> Self {
        Self {
            witness,
            contracted_neighbours: FxHashMap::default(),
        }
    }

    pub fn contracted_neighbours(&self, vertex: VertexId) -> u32 {
        self.contracted_neighbours.get(&vertex).copied().unwrap_or(0)
    }
}

impl<E: EdgeData, W: WitnessCalculator<E>> ImportanceCalculator<E> for EdgeDifference<W> {
    fn calculate(&self, graph: &Graph<E>, level: Level, vertex: VertexId) -> f64 {
        let added = required_shortcuts(graph, &self.witness, level, vertex, false).len();
        let v = graph.vertex(vertex);
        let removed = [Direction::Forward, Direction::Backward]
            .into_iter()
            .flat_map(|d| v.neighbours(d))
            .filter(|n| !graph.is_contracted(n.target))
            .count();

        added as f64 - removed as f64 + self.contracted_neighbours(vertex) as f64
    }

    fn notify_contracted(&mut self, graph: &Graph<E>, vertex: VertexId) {
        let v = graph.vertex(vertex);
        let neighbours: FxHashSet<VertexId> = v
            .forward
            .iter()
            .chain(v.backward.iter())
            .map(|n| n.target)
            .filter(|&t| t != vertex && !graph.is_contracted(t))
            .collect();
        for n in neighbours {
            *self.contracted_neighbours.entry(n).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::DijkstraWitness;
    use crate::graph::{Coordinate, RoadEdge, UNCONTRACTED};

    /// A→B(1), B→C(1), A→C(5), C→D(1)
    fn abcd() -> Graph {
        let mut g = Graph::new();
        for i in 0..4 {
            g.add_vertex(Coordinate::new(50.0, 4.0 + i as f64 * 0.001));
        }
        g.add_arc(0, 1, RoadEdge::new(1)).unwrap();
        g.add_arc(1, 2, RoadEdge::new(1)).unwrap();
        g.add_arc(0, 2, RoadEdge::new(5)).unwrap();
        g.add_arc(2, 3, RoadEdge::new(1)).unwrap();
        g
    }

    #[test]
    fn test_edge_difference_scores() {
        let g = abcd();
        let calc = EdgeDifference::new(DijkstraWitness::default());
        // B: one shortcut A→C needed, two arcs removed
        assert_eq!(calc.calculate(&g, UNCONTRACTED, 1), -1.0);
        // D: dead end, one arc removed
        assert_eq!(calc.calculate(&g, UNCONTRACTED, 3), -1.0);
        // C: shortcuts B→D and A→D, three arcs removed
        assert_eq!(calc.calculate(&g, UNCONTRACTED, 2), -1.0);
    }

    #[test]
    fn test_score_grows_with_contracted_neighbours() {
        let mut g = abcd();
        let mut calc = EdgeDifference::new(DijkstraWitness::default());
        let before = calc.calculate(&g, 1, 3);

        g.set_level(2, 1);
        calc.notify_contracted(&g, 2);
        assert_eq!(calc.contracted_neighbours(3), 1);
        assert_eq!(calc.contracted_neighbours(0), 1);
        assert_eq!(calc.contracted_neighbours(1), 1);
        assert!(calc.calculate(&g, 2, 3) >= before);
    }
}
