//! Witness search: is a shortcut through a vertex actually needed?

use rayon::prelude::*;

use crate::graph::{EdgeData, Graph, Level, Neighbour, VertexId, Weight};
use crate::search::{Dijkstra, VisitList};

/// Candidate shortcut `from → to` with its weight
pub type Shortcut = (VertexId, VertexId, Weight);

pub trait WitnessCalculator<E>: Send + Sync {
    /// True iff a path `from → to` of weight ≤ `bound` exists among the
    /// uncontracted vertices without passing through `through`
    fn exists(
        &self,
        graph: &Graph<E>,
        level: Level,
        from: VertexId,
        to: VertexId,
        through: VertexId,
        bound: Weight,
    ) -> bool;
}

/// Bounded "stop at first" Dijkstra restricted to uncontracted vertices.
///
/// With a settle limit a search that gives up reports no witness, which only
/// costs an extra shortcut.
#[derive(Debug, Clone, Copy, Default)]
pub struct DijkstraWitness {
    pub settle_limit: Option<usize>,
}

impl DijkstraWitness {
    pub fn new(settle_limit: Option<usize>) -> Self {
        Self { settle_limit }
    }
}

impl<E: EdgeData> WitnessCalculator<E> for DijkstraWitness {
    fn exists(
        &self,
        graph: &Graph<E>,
        _level: Level,
        from: VertexId,
        to: VertexId,
        through: VertexId,
        bound: Weight,
    ) -> bool {
        Dijkstra::new(graph)
            .uncontracted_only()
            .avoid(through)
            .bound(bound)
            .settle_limit(self.settle_limit)
            .route_to(&VisitList::single(from), &VisitList::single(to))
            .is_some()
    }
}

/// Cheapest entry per uncontracted neighbour, in first-seen order
fn cheapest_by_target<E: EdgeData>(
    graph: &Graph<E>,
    via: VertexId,
    list: &[Neighbour<E>],
) -> Vec<(VertexId, Weight)> {
    let mut best: Vec<(VertexId, Weight)> = Vec::with_capacity(list.len());
    for n in list {
        if n.target == via || graph.is_contracted(n.target) {
            continue;
        }
        match best.iter_mut().find(|(t, _)| *t == n.target) {
            Some(entry) => entry.1 = entry.1.min(n.weight()),
            None => best.push((n.target, n.weight())),
        }
    }
    best
}

/// Every `in-neighbour → out-neighbour` pair around `via`, weighted by the
/// path through it
pub fn candidate_pairs<E: EdgeData>(graph: &Graph<E>, via: VertexId) -> Vec<Shortcut> {
    let vertex = graph.vertex(via);
    let ins = cheapest_by_target(graph, via, &vertex.backward);
    let outs = cheapest_by_target(graph, via, &vertex.forward);

    let mut pairs = Vec::with_capacity(ins.len() * outs.len());
    for &(from, w_in) in &ins {
        for &(to, w_out) in &outs {
            if from != to {
                pairs.push((from, to, w_in.saturating_add(w_out)));
            }
        }
    }
    pairs
}

/// Candidate pairs around `via` that no witness covers.
///
/// Decisions only read the graph; with `parallel` they run on the rayon pool
/// and come back in candidate order.
pub fn required_shortcuts<E, W>(
    graph: &Graph<E>,
    witness: &W,
    level: Level,
    via: VertexId,
    parallel: bool,
) -> Vec<Shortcut>
where
    E: EdgeData,
    W: WitnessCalculator<E> + ?Sized,
{
    let pairs = candidate_pairs(graph, via);
    let needed =
        |&(from, to, weight): &Shortcut| !witness.exists(graph, level, from, to, via, weight);
    if parallel && pairs.len() > 1 {
        pairs.into_par_iter().filter(needed).collect()
    } else {
        pairs.into_iter().filter(needed).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Coordinate, RoadEdge, UNCONTRACTED};

    fn graph() -> Graph {
        // a → b → c (1 + 1), a → x → c (2 + 1)
        let mut g = Graph::new();
        for i in 0..4 {
            g.add_vertex(Coordinate::new(50.0, 4.0 + i as f64 * 0.001));
        }
        g.add_arc(0, 1, RoadEdge::new(1)).unwrap();
        g.add_arc(1, 2, RoadEdge::new(1)).unwrap();
        g.add_arc(0, 3, RoadEdge::new(2)).unwrap();
        g.add_arc(3, 2, RoadEdge::new(1)).unwrap();
        g
    }

    #[test]
    fn test_witness_within_bound() {
        let g = graph();
        let w = DijkstraWitness::default();
        assert!(w.exists(&g, UNCONTRACTED, 0, 2, 1, 3));
        assert!(!w.exists(&g, UNCONTRACTED, 0, 2, 1, 2));
    }

    #[test]
    fn test_witness_ignores_contracted_vertices() {
        let mut g = graph();
        g.set_level(3, 1);
        let w = DijkstraWitness::default();
        assert!(!w.exists(&g, 2, 0, 2, 1, 10));
    }

    #[test]
    fn test_candidate_pairs_skip_u_turns() {
        let mut g = graph();
        g.add_arc(2, 1, RoadEdge::new(4)).unwrap();
        g.add_arc(1, 0, RoadEdge::new(7)).unwrap();
        let mut pairs = candidate_pairs(&g, 1);
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 2, 2), (2, 0, 11)]);
    }

    #[test]
    fn test_required_shortcuts_parallel_matches_sequential() {
        let g = graph();
        let w = DijkstraWitness::default();
        let seq = required_shortcuts(&g, &w, UNCONTRACTED, 1, false);
        let par = required_shortcuts(&g, &w, UNCONTRACTED, 1, true);
        assert_eq!(seq, vec![(0, 2, 2)]);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_settle_limit_reports_no_witness() {
        let g = graph();
        let w = DijkstraWitness::new(Some(1));
        assert!(!w.exists(&g, UNCONTRACTED, 0, 2, 1, 3));
    }
}
