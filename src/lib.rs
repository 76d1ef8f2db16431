//! # Butterfly-ch
//!
//! Contraction Hierarchy preprocessing and shortest-path search for road
//! networks built from OpenStreetMap node/way events.
//!
//! ## Quick Start
//!
//! ```rust
//! use butterfly_ch::{ChQuery, ContractionConfig, Coordinate, Graph, Preprocessor, RoadEdge};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_vertex(Coordinate::new(50.0, 4.0));
//! let b = graph.add_vertex(Coordinate::new(50.0, 4.001));
//! let c = graph.add_vertex(Coordinate::new(50.0, 4.002));
//! graph.add_arc(a, b, RoadEdge::new(70))?;
//! graph.add_arc(b, c, RoadEdge::new(70))?;
//!
//! let ids: Vec<_> = graph.ids().collect();
//! let mut pre = Preprocessor::new(graph, ContractionConfig::default());
//! pre.start(ids);
//! let contracted = pre.into_graph();
//!
//! assert_eq!(ChQuery::new(&contracted).distance(a, c), Some(140));
//! # Ok::<(), butterfly_ch::Error>(())
//! ```

pub mod ch;
pub mod error;
pub mod format;
pub mod geo;
pub mod graph;
pub mod ingest;
pub mod queue;
pub mod search;
pub mod validate;

pub use ch::{
    ArcChange, ArcListener, ChQuery, ContractionConfig, ContractionStats, DefaultPreprocessor,
    DijkstraWitness, EdgeDifference, ImportanceCalculator, Preprocessor, WitnessCalculator,
};
pub use error::{Error, Result};
pub use graph::{
    Coordinate, Direction, EdgeData, Graph, Level, Neighbour, RoadEdge, TagId, Vertex, VertexId,
    Weight, UNCONTRACTED, UNREACHABLE,
};
pub use ingest::{ChangeType, GraphBuilder, IngestEvent};
pub use queue::LazyQueue;
pub use search::{Dijkstra, Matrix, Path, SearchConfig, Snap, SpatialIndex, VisitList};
pub use validate::{validate_ch, ValidationResult};
