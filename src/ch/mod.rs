//! Contraction Hierarchies: preprocessing and upward queries

mod importance;
mod listener;
mod preprocess;
mod query;
mod witness;

pub use importance::{EdgeDifference, ImportanceCalculator};
pub use listener::{ArcChange, ArcListener};
pub use preprocess::{ContractionConfig, ContractionStats, DefaultPreprocessor, Preprocessor};
pub use query::ChQuery;
pub use witness::{
    candidate_pairs, required_shortcuts, DijkstraWitness, Shortcut, WitnessCalculator,
};
