//! Contraction Hierarchy preprocessing
//!
//! # Algorithm Overview
//!
//! Vertices are contracted one at a time, cheapest first according to an
//! [`ImportanceCalculator`]. Contracting `v`:
//!
//! 1. assigns `v` the next level (levels start at 1 and never repeat)
//! 2. removes the arcs pointing at `v` from its uncontracted neighbours; `v`
//!    keeps its own lists, which from now on only point upward
//! 3. for every in-neighbour `u` and out-neighbour `w` of `v` asks the
//!    [`WitnessCalculator`] whether `u → w` is possible within
//!    `d(u, v) + d(v, w)` without `v`; if not, adds the shortcut `u → w`
//!
//! # Lazy Updates
//!
//! Importance values go stale as neighbours get contracted. `select_next`
//! recomputes the queue minimum and accepts it only if it did not grow;
//! otherwise it re-keys it and looks again. After too many consecutive
//! re-keyings every queued vertex is re-scored once.
//!
//! # Parallelism
//!
//! Contraction itself is sequential. The witness searches of one contraction
//! step only read the graph and run on the rayon pool; their shortcuts are
//! applied after all decisions are in.

use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use super::importance::{EdgeDifference, ImportanceCalculator};
use super::listener::ArcListener;
use super::witness::{required_shortcuts, DijkstraWitness, WitnessCalculator};
use crate::graph::{Direction, EdgeData, Graph, Level, Neighbour, VertexId};
use crate::queue::LazyQueue;

/// Contraction configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionConfig {
    /// Consecutive stale re-keyings tolerated before a full re-scoring pass
    pub max_consecutive_misses: usize,
    /// Cap on vertices settled per witness search (`None` = exact)
    pub witness_settle_limit: Option<usize>,
    /// Run the witness searches of one step on the rayon pool
    pub parallel_witness: bool,
    /// Log progress every N contractions (0 = never)
    pub progress_interval: usize,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            max_consecutive_misses: 256,
            witness_settle_limit: None,
            parallel_witness: true,
            progress_interval: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractionStats {
    pub contracted: usize,
    pub shortcuts_added: usize,
    pub arcs_removed: usize,
    /// Queue minima that had gone stale and were re-keyed
    pub lazy_updates: usize,
    pub forced_passes: usize,
}

/// Contraction Hierarchy preprocessor owning the graph it mutates
pub struct Preprocessor<E, C, W, L = ()> {
    graph: Graph<E>,
    calculator: C,
    witness: W,
    listener: L,
    queue: LazyQueue,
    level: Level,
    misses: usize,
    config: ContractionConfig,
    stats: ContractionStats,
}

/// Preprocessor with the edge-difference heuristic and Dijkstra witnesses
pub type DefaultPreprocessor<E, L = ()> =
    Preprocessor<E, EdgeDifference<DijkstraWitness>, DijkstraWitness, L>;

impl<E: EdgeData> DefaultPreprocessor<E> {
    pub fn new(graph: Graph<E>, config: ContractionConfig) -> Self {
        let witness = DijkstraWitness::new(config.witness_settle_limit);
        Preprocessor::with_parts(graph, config, EdgeDifference::new(witness), witness, ())
    }
}

impl<E, C, W, L> Preprocessor<E, C, W, L>
where
    E: EdgeData,
    C: ImportanceCalculator<E>,
    W: WitnessCalculator<E>,
    L: ArcListener,
{
    pub fn with_parts(
        graph: Graph<E>,
        config: ContractionConfig,
        calculator: C,
        witness: W,
        listener: L,
    ) -> Self {
        Self {
            graph,
            calculator,
            witness,
            listener,
            queue: LazyQueue::new(),
            level: 1,
            misses: 0,
            config,
            stats: ContractionStats::default(),
        }
    }

    /// Swap the arc-change listener
    pub fn with_listener<L2: ArcListener>(self, listener: L2) -> Preprocessor<E, C, W, L2> {
        Preprocessor {
            graph: self.graph,
            calculator: self.calculator,
            witness: self.witness,
            listener,
            queue: self.queue,
            level: self.level,
            misses: self.misses,
            config: self.config,
            stats: self.stats,
        }
    }

    pub fn graph(&self) -> &Graph<E> {
        &self.graph
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn stats(&self) -> &ContractionStats {
        &self.stats
    }

    /// Level the next contraction will assign
    pub fn next_level(&self) -> Level {
        self.level
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn into_graph(self) -> Graph<E> {
        self.graph
    }

    pub fn into_parts(self) -> (Graph<E>, L) {
        (self.graph, self.listener)
    }

    fn score_all(&self, ids: &[VertexId]) -> Vec<f64> {
        let (graph, calculator, level) = (&self.graph, &self.calculator, self.level);
        if self.config.parallel_witness {
            ids.par_iter()
                .map(|&v| calculator.calculate(graph, level, v))
                .collect()
        } else {
            ids.iter()
                .map(|&v| calculator.calculate(graph, level, v))
                .collect()
        }
    }

    /// Score and queue every uncontracted vertex of `ids`; queued ones are
    /// re-keyed
    pub fn enqueue(&mut self, ids: impl IntoIterator<Item = VertexId>) {
        let ids: Vec<VertexId> = ids
            .into_iter()
            .filter(|&v| !self.graph.is_contracted(v))
            .collect();
        let scores = self.score_all(&ids);
        for (v, score) in ids.into_iter().zip(scores) {
            self.queue.enqueue(v, score);
        }
    }

    /// Next vertex to contract, `None` once the queue is empty.
    ///
    /// The vertex stays queued until [`Preprocessor::contract`] takes it.
    pub fn select_next(&mut self) -> Option<VertexId> {
        loop {
            let (v, stored) = self.queue.peek()?;
            let current = self.calculator.calculate(&self.graph, self.level, v);
            if current <= stored {
                self.misses = 0;
                return Some(v);
            }

            self.queue.enqueue(v, current);
            self.stats.lazy_updates += 1;
            self.misses += 1;
            if self.misses > self.config.max_consecutive_misses {
                self.rescore_all();
                self.misses = 0;
            }
        }
    }

    fn rescore_all(&mut self) {
        let mut ids: Vec<VertexId> = self.queue.ids().collect();
        ids.sort_unstable();
        let scores = self.score_all(&ids);
        for (&v, score) in ids.iter().zip(scores) {
            self.queue.enqueue(v, score);
        }
        self.stats.forced_passes += 1;
        tracing::debug!(
            queued = ids.len(),
            level = self.level,
            "forced full importance pass"
        );
    }

    /// Contract `vertex` and return the number of shortcuts added.
    ///
    /// Panics if `vertex` is already contracted.
    pub fn contract(&mut self, vertex: VertexId) -> usize {
        assert!(
            !self.graph.is_contracted(vertex),
            "vertex {} is already contracted (level {})",
            vertex,
            self.graph.level(vertex)
        );
        self.queue.remove(vertex);

        let level = self.level;
        self.graph.set_level(vertex, level);
        self.level += 1;

        let ins = distinct_uncontracted(&self.graph, vertex, Direction::Backward);
        let outs = distinct_uncontracted(&self.graph, vertex, Direction::Forward);

        for &from in &ins {
            let removed = self.graph.remove_entries(from, Direction::Forward, vertex);
            for _ in 0..removed {
                self.listener.on_arc_removed(from, vertex);
            }
            self.stats.arcs_removed += removed;
        }
        for &to in &outs {
            let removed = self.graph.remove_entries(to, Direction::Backward, vertex);
            for _ in 0..removed {
                self.listener.on_arc_removed(vertex, to);
            }
            self.stats.arcs_removed += removed;
        }

        let shortcuts = required_shortcuts(
            &self.graph,
            &self.witness,
            level,
            vertex,
            self.config.parallel_witness,
        );
        for &(from, to, weight) in &shortcuts {
            self.graph.push_entry(
                from,
                Direction::Forward,
                Neighbour::new(to, E::shortcut(weight, vertex)),
            );
            self.graph.push_entry(
                to,
                Direction::Backward,
                Neighbour::new(from, E::shortcut(weight, vertex)),
            );
            self.listener.on_arc_added(from, to);
        }

        self.calculator.notify_contracted(&self.graph, vertex);

        let mut updated: Vec<VertexId> = ins.into_iter().chain(outs).collect();
        updated.sort_unstable();
        updated.dedup();
        self.listener.on_vertices_updated(&updated);

        self.stats.contracted += 1;
        self.stats.shortcuts_added += shortcuts.len();
        tracing::trace!(vertex, level, shortcuts = shortcuts.len(), "contracted");

        shortcuts.len()
    }

    /// Enqueue `ids` and contract until the queue runs dry
    pub fn start(&mut self, ids: impl IntoIterator<Item = VertexId>) -> ContractionStats {
        let started = Instant::now();
        self.enqueue(ids);
        tracing::info!(
            queued = self.queue.len(),
            arcs = self.graph.arc_count(),
            "contraction started"
        );

        while let Some(v) = self.select_next() {
            self.contract(v);
            let interval = self.config.progress_interval;
            if interval > 0 && self.stats.contracted % interval == 0 {
                tracing::info!(
                    contracted = self.stats.contracted,
                    remaining = self.queue.len(),
                    shortcuts = self.stats.shortcuts_added,
                    "contraction progress"
                );
            }
        }

        tracing::info!(
            contracted = self.stats.contracted,
            shortcuts = self.stats.shortcuts_added,
            lazy_updates = self.stats.lazy_updates,
            forced_passes = self.stats.forced_passes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "contraction finished"
        );
        self.stats.clone()
    }
}

fn distinct_uncontracted<E: EdgeData>(
    graph: &Graph<E>,
    vertex: VertexId,
    direction: Direction,
) -> Vec<VertexId> {
    let mut ids: Vec<VertexId> = graph
        .neighbours(vertex, direction)
        .iter()
        .map(|n| n.target)
        .filter(|&t| t != vertex && !graph.is_contracted(t))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
