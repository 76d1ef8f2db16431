//! Lazy decrease-key priority queue for contraction ordering
//!
//! At most one entry per id. Re-enqueueing an id re-keys it; the queue never
//! recomputes priorities itself, callers re-enqueue when they learn a value
//! went stale. Ties are popped in enqueue order.

use priority_queue::PriorityQueue;
use std::cmp::{Ordering, Reverse};

use crate::graph::VertexId;

/// Importance ordered by `f64::total_cmp`, then by enqueue sequence
#[derive(Debug, Clone, Copy)]
struct Key {
    weight: f64,
    seq: u64,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-queue of vertex ids keyed by a floating importance
#[derive(Debug, Default)]
pub struct LazyQueue {
    pq: PriorityQueue<VertexId, Reverse<Key>>,
    seq: u64,
}

impl LazyQueue {
    /// Weight reported by [`LazyQueue::weight`] for absent ids
    pub const DEFAULT_WEIGHT: f64 = 0.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`, or re-key it if it is already queued
    pub fn enqueue(&mut self, id: VertexId, weight: f64) {
        let key = Key {
            weight,
            seq: self.seq,
        };
        self.seq += 1;
        self.pq.push(id, Reverse(key));
    }

    /// Id with the minimum weight, without removing it
    pub fn peek(&self) -> Option<(VertexId, f64)> {
        self.pq.peek().map(|(&id, Reverse(key))| (id, key.weight))
    }

    pub fn pop(&mut self) -> Option<(VertexId, f64)> {
        self.pq.pop().map(|(id, Reverse(key))| (id, key.weight))
    }

    /// Remove `id` wherever it sits; returns its last weight
    pub fn remove(&mut self, id: VertexId) -> Option<f64> {
        self.pq.remove(&id).map(|(_, Reverse(key))| key.weight)
    }

    /// Last stored weight of `id`, or [`LazyQueue::DEFAULT_WEIGHT`]
    pub fn weight(&self, id: VertexId) -> f64 {
        self.pq
            .get_priority(&id)
            .map(|Reverse(key)| key.weight)
            .unwrap_or(Self::DEFAULT_WEIGHT)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.pq.get_priority(&id).is_some()
    }

    /// All queued ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.pq.iter().map(|(&id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.pq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pq.is_empty()
    }
}
