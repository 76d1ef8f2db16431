//! CH query: bidirectional upward Dijkstra plus shortcut unpacking

use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;

use crate::graph::{Direction, EdgeData, Graph, VertexId, Weight};
use crate::search::{Path, VisitList};

/// Arc used to reach a vertex: `(previous vertex, weight, shortcut via)`
type Parent = Option<(VertexId, Weight, Option<VertexId>)>;

/// One direction of the bidirectional search
struct Side {
    direction: Direction,
    dist: FxHashMap<VertexId, (Weight, Parent)>,
    pq: PriorityQueue<VertexId, Reverse<Weight>>,
    settled: usize,
}

impl Side {
    fn new<E: EdgeData>(graph: &Graph<E>, direction: Direction, entries: &VisitList) -> Self {
        let mut side = Self {
            direction,
            dist: FxHashMap::default(),
            pq: PriorityQueue::new(),
            settled: 0,
        };
        for &(v, w) in entries.entries() {
            if graph.get(v).is_none() {
                tracing::debug!(vertex = v, ?direction, "unknown query vertex ignored");
                continue;
            }
            if side.dist.get(&v).map_or(true, |&(old, _)| w < old) {
                side.dist.insert(v, (w, None));
                side.pq.push(v, Reverse(w));
            }
        }
        side
    }

    fn min_key(&self) -> Option<Weight> {
        self.pq.peek().map(|(_, Reverse(d))| *d)
    }

    fn weight_to(&self, vertex: VertexId) -> Weight {
        self.dist.get(&vertex).map_or(0, |&(w, _)| w)
    }

    /// Vertices from the search origin to `vertex`, with the arcs taken
    fn chain(&self, vertex: VertexId) -> Vec<(VertexId, Weight, Option<VertexId>, VertexId)> {
        let mut arcs = Vec::new();
        let mut current = vertex;
        while let Some(&(_, Some((prev, w, via)))) = self.dist.get(&current) {
            arcs.push((prev, w, via, current));
            current = prev;
        }
        arcs.reverse();
        arcs
    }
}

/// Point-to-point queries on a contracted graph.
///
/// Both searches only follow arcs toward vertices of equal or higher level;
/// the forward search uses forward lists from the source side and the
/// backward search backward lists from the target side.
pub struct ChQuery<'g, E> {
    graph: &'g Graph<E>,
}

impl<'g, E: EdgeData> ChQuery<'g, E> {
    pub fn new(graph: &'g Graph<E>) -> Self {
        Self { graph }
    }

    pub fn distance(&self, source: VertexId, target: VertexId) -> Option<Weight> {
        self.search(&VisitList::single(source), &VisitList::single(target))
            .map(|(weight, _, _, _)| weight)
    }

    /// Shortest path with every shortcut expanded into original arcs
    pub fn route(&self, source: &VisitList, target: &VisitList) -> Option<Path> {
        let (weight, meeting, forward, backward) = self.search(source, target)?;

        let up = forward.chain(meeting);
        let mut vertices = vec![up.first().map_or(meeting, |&(v, _, _, _)| v)];
        for &(tail, w, via, head) in &up {
            self.unpack(tail, head, w, via, &mut vertices);
        }
        let up = Path {
            vertices,
            weight: forward.weight_to(meeting),
        };

        // Backward arcs were walked head-first; (prev, _, _, current) means current → prev
        let mut vertices = vec![meeting];
        for &(head, w, via, tail) in backward.chain(meeting).iter().rev() {
            self.unpack(tail, head, w, via, &mut vertices);
        }
        vertices.reverse();
        let down = Path {
            vertices,
            weight: backward.weight_to(meeting),
        };

        let path = Path::join(up, down);
        debug_assert_eq!(path.weight, weight);
        Some(path)
    }

    fn search(
        &self,
        source: &VisitList,
        target: &VisitList,
    ) -> Option<(Weight, VertexId, Side, Side)> {
        let mut forward = Side::new(self.graph, Direction::Forward, source);
        let mut backward = Side::new(self.graph, Direction::Backward, target);
        let mut best: Option<(Weight, VertexId)> = None;

        loop {
            let f = forward.min_key();
            let b = backward.min_key();
            let bound = best.map(|(w, _)| w);
            let f_open = f.is_some_and(|d| bound.map_or(true, |w| d < w));
            let b_open = b.is_some_and(|d| bound.map_or(true, |w| d < w));
            if !f_open && !b_open {
                break;
            }
            let (side, other) = if f_open && (!b_open || f <= b) {
                (&mut forward, &backward)
            } else {
                (&mut backward, &forward)
            };
            self.step(side, other, &mut best);
        }

        tracing::trace!(
            forward_settled = forward.settled,
            backward_settled = backward.settled,
            "ch query finished"
        );

        let (weight, meeting) = best?;
        Some((weight, meeting, forward, backward))
    }

    fn step(&self, side: &mut Side, other: &Side, best: &mut Option<(Weight, VertexId)>) {
        let Some((u, Reverse(d))) = side.pq.pop() else {
            return;
        };
        side.settled += 1;

        if let Some(&(od, _)) = other.dist.get(&u) {
            let total = d.saturating_add(od);
            if best.map_or(true, |(w, _)| total < w) {
                *best = Some((total, u));
            }
        }

        let level = self.graph.level(u);
        for n in self.graph.neighbours(u, side.direction) {
            if self.graph.level(n.target) < level {
                continue;
            }
            let nd = d.saturating_add(n.weight());
            if side.dist.get(&n.target).map_or(true, |&(old, _)| nd < old) {
                let parent = Some((u, n.weight(), n.contracted_vertex()));
                side.dist.insert(n.target, (nd, parent));
                side.pq.push(n.target, Reverse(nd));
            }
        }
    }

    /// Append the original vertices of arc `tail → head` after `tail`
    fn unpack(
        &self,
        tail: VertexId,
        head: VertexId,
        weight: Weight,
        via: Option<VertexId>,
        out: &mut Vec<VertexId>,
    ) {
        let Some(via) = via else {
            out.push(head);
            return;
        };

        let halves = self
            .graph
            .neighbours(via, Direction::Backward)
            .iter()
            .filter(|a| a.target == tail)
            .find_map(|a| {
                self.graph
                    .neighbours(via, Direction::Forward)
                    .iter()
                    .find(|b| {
                        b.target == head && a.weight().saturating_add(b.weight()) == weight
                    })
                    .map(|b| (a, b))
            });

        match halves {
            Some((a, b)) => {
                self.unpack(tail, via, a.weight(), a.contracted_vertex(), out);
                self.unpack(via, head, b.weight(), b.contracted_vertex(), out);
            }
            None => {
                tracing::trace!(tail, via, head, weight, "unpack: missing sub-arc");
                out.push(head);
            }
        }
    }
}
