//! CH correctness validation
//!
//! Compares CH query distances on a contracted graph against plain Dijkstra
//! on the original graph for random (source, target) pairs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::ch::ChQuery;
use crate::graph::{EdgeData, Graph, VertexId, Weight, UNREACHABLE};
use crate::search::{Dijkstra, VisitList};

/// Maximum number of mismatches kept as samples
const MAX_SAMPLES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub source: VertexId,
    pub target: VertexId,
    pub dijkstra: Weight,
    pub ch: Weight,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub checked: usize,
    pub matching: usize,
    pub mismatches: usize,
    pub unreachable_both: usize,
    pub samples: Vec<Mismatch>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.mismatches == 0
    }
}

/// Check `n_pairs` random pairs. Both graphs must share vertex ids.
pub fn validate_ch<E: EdgeData>(
    original: &Graph<E>,
    contracted: &Graph<E>,
    n_pairs: usize,
    seed: u64,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let n = original.vertex_count().min(contracted.vertex_count()) as VertexId;
    if n == 0 {
        return result;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let plain = Dijkstra::new(original);
    let query = ChQuery::new(contracted);

    for i in 0..n_pairs {
        let source = rng.random_range(0..n);
        let target = rng.random_range(0..n);

        let dijkstra = plain
            .route_to(&VisitList::single(source), &VisitList::single(target))
            .map_or(UNREACHABLE, |p| p.weight);
        let ch = query.distance(source, target).unwrap_or(UNREACHABLE);

        result.checked += 1;
        if dijkstra == ch {
            result.matching += 1;
            if dijkstra == UNREACHABLE {
                result.unreachable_both += 1;
            }
        } else {
            result.mismatches += 1;
            tracing::debug!(source, target, dijkstra, ch, "distance mismatch");
            if result.samples.len() < MAX_SAMPLES {
                result.samples.push(Mismatch {
                    source,
                    target,
                    dijkstra,
                    ch,
                });
            }
        }

        if (i + 1) % 1000 == 0 {
            tracing::info!(
                checked = i + 1,
                total = n_pairs,
                mismatches = result.mismatches,
                "validation progress"
            );
        }
    }

    tracing::info!(
        checked = result.checked,
        mismatches = result.mismatches,
        unreachable = result.unreachable_both,
        "validation finished"
    );
    result
}
