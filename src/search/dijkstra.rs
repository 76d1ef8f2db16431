//! Label-setting Dijkstra over a decrease-key visit queue
//!
//! One engine, four result modes:
//! - nearest target ("stop at first"), also the witness-search primitive
//! - one-to-many, with `None` for unreachable targets
//! - many-to-many, rows computed in parallel, `UNREACHABLE` in the matrix
//! - range, the reachable set within a bound plus the frontier beyond it
//!
//! Each search owns its visit queue, labels and path arena; the graph is only
//! read.

use indicatif::ProgressBar;
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::graph::{Direction, EdgeData, Graph, VertexId, Weight, UNREACHABLE};

use super::constraint::{extend_sequence, Constraint, Label};
use super::path::{Path, PathArena, SegmentId};
use super::visit::VisitList;

/// Knobs shared by every search mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub direction: Direction,
    /// Weights above this are never reported
    pub bound: Weight,
    /// Stop after settling this many vertices
    pub settle_limit: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            bound: UNREACHABLE,
            settle_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SearchStats {
    settled: usize,
    relaxed: usize,
    rejected: usize,
}

/// Row-major source × target weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
    pub n_sources: usize,
    pub n_targets: usize,
    pub weights: Vec<Weight>,
}

impl Matrix {
    pub fn get(&self, source: usize, target: usize) -> Weight {
        self.weights[source * self.n_targets + target]
    }

    pub fn row(&self, source: usize) -> &[Weight] {
        &self.weights[source * self.n_targets..(source + 1) * self.n_targets]
    }
}

/// Result of a range search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResult {
    /// Settled vertices with their weight, in settle order
    pub reachable: Vec<(VertexId, Weight)>,
    /// Vertices popped with a weight above the bound
    pub frontier: Vec<VertexId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Nearest,
    All,
    Range,
}

struct Outcome {
    arena: PathArena,
    best: Vec<Option<(Weight, SegmentId)>>,
    range: RangeResult,
}

/// Plain shortest-path engine over a borrowed graph
pub struct Dijkstra<'g, E> {
    graph: &'g Graph<E>,
    config: SearchConfig,
    constraint: Option<&'g dyn Constraint<E>>,
    avoid: Option<VertexId>,
    uncontracted_only: bool,
}

impl<'g, E: EdgeData> Dijkstra<'g, E> {
    pub fn new(graph: &'g Graph<E>) -> Self {
        Self {
            graph,
            config: SearchConfig::default(),
            constraint: None,
            avoid: None,
            uncontracted_only: false,
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.config.direction = direction;
        self
    }

    pub fn bound(mut self, bound: Weight) -> Self {
        self.config.bound = bound;
        self
    }

    pub fn settle_limit(mut self, limit: Option<usize>) -> Self {
        self.config.settle_limit = limit;
        self
    }

    pub fn constraint(mut self, constraint: &'g dyn Constraint<E>) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Never enter `vertex`
    pub fn avoid(mut self, vertex: VertexId) -> Self {
        self.avoid = Some(vertex);
        self
    }

    /// Only enter vertices that have not been contracted yet
    pub fn uncontracted_only(mut self) -> Self {
        self.uncontracted_only = true;
        self
    }

    /// Lowest-weight path to the closest of `targets`, with that target's index
    pub fn route(&self, source: &VisitList, targets: &[VisitList]) -> Option<(usize, Path)> {
        let outcome = self.run(source, targets, Mode::Nearest);
        let (index, (weight, seg)) = outcome
            .best
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|b| (i, b)))
            .min_by_key(|&(i, (weight, _))| (weight, i))?;
        Some((index, self.path(&outcome.arena, seg, weight)))
    }

    pub fn route_to(&self, source: &VisitList, target: &VisitList) -> Option<Path> {
        self.route(source, std::slice::from_ref(target))
            .map(|(_, path)| path)
    }

    /// Shortest path per target list; `None` marks an unreachable target
    pub fn route_one_to_many(
        &self,
        source: &VisitList,
        targets: &[VisitList],
    ) -> Vec<Option<Path>> {
        let outcome = self.run(source, targets, Mode::All);
        outcome
            .best
            .iter()
            .map(|b| b.map(|(weight, seg)| self.path(&outcome.arena, seg, weight)))
            .collect()
    }

    /// Like [`Dijkstra::route_one_to_many`] without building paths
    pub fn weights_one_to_many(&self, source: &VisitList, targets: &[VisitList]) -> Vec<Weight> {
        self.run(source, targets, Mode::All)
            .best
            .iter()
            .map(|b| b.map_or(UNREACHABLE, |(weight, _)| weight))
            .collect()
    }

    /// One-to-many per source, rows computed in parallel
    pub fn route_many_to_many(
        &self,
        sources: &[VisitList],
        targets: &[VisitList],
        progress: Option<&ProgressBar>,
    ) -> Matrix {
        let n_sources = sources.len();
        let report_every = (n_sources / 10).max(1);
        let done = AtomicUsize::new(0);

        let rows: Vec<Vec<Weight>> = sources
            .par_iter()
            .map(|source| {
                let row = self.weights_one_to_many(source, targets);
                let n = done.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                if n % report_every == 0 || n == n_sources {
                    tracing::info!(done = n, total = n_sources, "many-to-many rows");
                }
                row
            })
            .collect();

        Matrix {
            n_sources,
            n_targets: targets.len(),
            weights: rows.into_iter().flatten().collect(),
        }
    }

    /// Reachable set within `bound` and the frontier just beyond it
    pub fn range_search(&self, source: &VisitList, bound: Weight) -> RangeResult {
        let search = Dijkstra {
            graph: self.graph,
            config: SearchConfig {
                bound,
                ..self.config
            },
            constraint: self.constraint,
            avoid: self.avoid,
            uncontracted_only: self.uncontracted_only,
        };
        search.run(source, &[], Mode::Range).range
    }

    /// Vertices reachable with weight ≤ `bound`
    pub fn range(&self, source: &VisitList, bound: Weight) -> Vec<VertexId> {
        self.range_search(source, bound)
            .reachable
            .into_iter()
            .map(|(v, _)| v)
            .collect()
    }

    /// Vertices whose settled weight would exceed `bound`
    pub fn range_frontier(&self, source: &VisitList, bound: Weight) -> Vec<VertexId> {
        self.range_search(source, bound).frontier
    }

    pub fn connected(&self, from: VertexId, to: VertexId) -> bool {
        self.route_to(&VisitList::single(from), &VisitList::single(to))
            .is_some()
    }

    fn path(&self, arena: &PathArena, seg: SegmentId, weight: Weight) -> Path {
        let mut vertices = arena.vertices_to(seg);
        if self.config.direction == Direction::Backward {
            vertices.reverse();
        }
        Path { vertices, weight }
    }

    fn run(&self, source: &VisitList, targets: &[VisitList], mode: Mode) -> Outcome {
        let graph = self.graph;
        let direction = self.config.direction;
        let bound = self.config.bound;

        let mut target_entries: FxHashMap<VertexId, Vec<(usize, Weight)>> = FxHashMap::default();
        for (i, list) in targets.iter().enumerate() {
            for &(v, partial) in list.entries() {
                target_entries.entry(v).or_default().push((i, partial));
            }
        }

        let mut arena = PathArena::new();
        let mut pq: PriorityQueue<VertexId, Reverse<Weight>> = PriorityQueue::new();
        let mut tentative: FxHashMap<VertexId, (Weight, SegmentId)> = FxHashMap::default();
        let mut settled: FxHashSet<VertexId> = FxHashSet::default();
        let mut labels: FxHashMap<VertexId, Vec<Label>> = FxHashMap::default();

        let mut best: Vec<Option<(Weight, SegmentId)>> = vec![None; targets.len()];
        let mut found = 0usize;
        let mut nearest: Option<Weight> = None;
        let mut worst_found: Weight = 0;
        let mut range = RangeResult::default();
        let mut stats = SearchStats::default();

        for &(v, w) in source.entries() {
            if graph.get(v).is_none() {
                tracing::debug!(vertex = v, "unknown source vertex ignored");
                continue;
            }
            if tentative.get(&v).map_or(true, |&(old, _)| w < old) {
                let seg = arena.push(v, w, None);
                tentative.insert(v, (w, seg));
                pq.push(v, Reverse(w));
            }
        }

        while let Some((u, Reverse(d))) = pq.pop() {
            if d > bound {
                if mode == Mode::Range {
                    range.frontier.push(u);
                    continue;
                }
                break;
            }
            let done = match mode {
                Mode::Nearest => nearest.is_some_and(|n| d >= n),
                Mode::All => !targets.is_empty() && found == targets.len() && d >= worst_found,
                Mode::Range => false,
            };
            if done || self.config.settle_limit.is_some_and(|limit| stats.settled >= limit) {
                break;
            }

            settled.insert(u);
            stats.settled += 1;
            let seg_u = tentative[&u].1;
            if mode == Mode::Range {
                range.reachable.push((u, d));
            }

            if let Some(entries) = target_entries.get(&u) {
                for &(i, partial) in entries {
                    let total = d.saturating_add(partial);
                    if total > bound || best[i].is_some_and(|(t, _)| t <= total) {
                        continue;
                    }
                    if best[i].is_none() {
                        found += 1;
                    }
                    best[i] = Some((total, seg_u));
                    nearest = Some(nearest.map_or(total, |n| n.min(total)));
                    if found == targets.len() {
                        worst_found = best.iter().flatten().map(|&(t, _)| t).max().unwrap_or(0);
                    }
                }
            }

            // Labels live only while their vertex is on the frontier
            let sequence = labels.remove(&u).unwrap_or_default();

            for n in graph.neighbours(u, direction) {
                let v = n.target;
                if settled.contains(&v) || self.avoid == Some(v) {
                    continue;
                }
                if self.uncontracted_only && graph.is_contracted(v) {
                    continue;
                }

                let nd = d.saturating_add(n.weight());
                if mode != Mode::Range && nd > bound {
                    continue;
                }

                let mut next_sequence = None;
                if let Some(constraint) = self.constraint {
                    let label = constraint.label(graph, u, n);
                    if !constraint.permits(&sequence, label) {
                        stats.rejected += 1;
                        continue;
                    }
                    next_sequence = Some(extend_sequence(&sequence, label));
                }

                stats.relaxed += 1;
                if tentative.get(&v).map_or(true, |&(old, _)| nd < old) {
                    let seg = arena.push(v, nd, Some(seg_u));
                    tentative.insert(v, (nd, seg));
                    pq.push(v, Reverse(nd));
                    if let Some(seq) = next_sequence {
                        labels.insert(v, seq);
                    }
                }
            }
        }

        tracing::trace!(
            settled = stats.settled,
            relaxed = stats.relaxed,
            rejected = stats.rejected,
            "dijkstra finished"
        );

        Outcome { arena, best, range }
    }
}
