//! Graph building from node/way create events
//!
//! Events are buffered and turned into a graph in one go by
//! [`GraphBuilder::build`]: ways are split at junctions, intermediate nodes
//! become shape points and arc weights are haversine lengths in decimetres.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::geo::polyline_length;
use crate::graph::{Coordinate, Graph, RoadEdge, VertexId, Weight};

/// OSM change type attached to every ingestion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    #[default]
    Create,
    Modify,
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Modify => write!(f, "modify"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// One line of a JSON-lines event stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IngestEvent {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        change: ChangeType,
    },
    Way {
        nodes: Vec<i64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
        #[serde(default)]
        change: ChangeType,
    },
}

/// Travel directions allowed on a way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Oneway {
    No,
    Forward,
    Reverse,
}

impl Oneway {
    fn from_tags(tags: &[(String, String)]) -> Self {
        match tags.iter().find(|(k, _)| k == "oneway").map(|(_, v)| v.as_str()) {
            Some("yes" | "true" | "1") => Oneway::Forward,
            Some("-1") => Oneway::Reverse,
            _ => Oneway::No,
        }
    }
}

struct PendingWay {
    nodes: Vec<i64>,
    tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub ways: usize,
    pub skipped_ways: usize,
    pub vertices: usize,
    pub arcs: usize,
}

/// Buffers ingestion events and builds the routing graph
#[derive(Default)]
pub struct GraphBuilder {
    nodes: FxHashMap<i64, Coordinate>,
    ways: Vec<PendingWay>,
}

fn reject(kind: ChangeType, entity: String) -> Error {
    Error::UnsupportedChange {
        kind: kind.to_string(),
        entity,
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_node_create(
        &mut self,
        id: i64,
        lat: f64,
        lon: f64,
        change: ChangeType,
    ) -> Result<()> {
        if change != ChangeType::Create {
            return Err(reject(change, format!("node {}", id)));
        }
        self.nodes.insert(id, Coordinate::new(lat, lon));
        Ok(())
    }

    pub fn process_way_create(
        &mut self,
        nodes: Vec<i64>,
        tags: Vec<(String, String)>,
        change: ChangeType,
    ) -> Result<()> {
        if change != ChangeType::Create {
            return Err(reject(change, format!("way #{}", self.ways.len())));
        }
        self.ways.push(PendingWay { nodes, tags });
        Ok(())
    }

    pub fn apply(&mut self, event: IngestEvent) -> Result<()> {
        match event {
            IngestEvent::Node {
                id,
                lat,
                lon,
                change,
            } => self.process_node_create(id, lat, lon, change),
            IngestEvent::Way {
                nodes,
                tags,
                change,
            } => self.process_way_create(nodes, tags.into_iter().collect(), change),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn build(self) -> Result<Graph<RoadEdge>> {
        self.build_with_stats().map(|(graph, _)| graph)
    }

    pub fn build_with_stats(self) -> Result<(Graph<RoadEdge>, BuildStats)> {
        let mut stats = BuildStats {
            ways: self.ways.len(),
            ..Default::default()
        };

        // A node splits ways when it is used twice or ends a way
        let mut uses: FxHashMap<i64, u32> = FxHashMap::default();
        for way in &self.ways {
            for (i, id) in way.nodes.iter().enumerate() {
                let bump = if i == 0 || i + 1 == way.nodes.len() { 2 } else { 1 };
                *uses.entry(*id).or_insert(0) += bump;
            }
        }

        let mut graph = Graph::with_capacity(uses.values().filter(|&&u| u >= 2).count());
        let mut vertex_of: FxHashMap<i64, VertexId> = FxHashMap::default();

        for (index, way) in self.ways.iter().enumerate() {
            let mut nodes = way.nodes.clone();
            nodes.dedup();
            if nodes.len() < 2 {
                stats.skipped_ways += 1;
                tracing::debug!(way = index, "way with fewer than two distinct nodes skipped");
                continue;
            }

            let mut coords = Vec::with_capacity(nodes.len());
            for id in &nodes {
                let coord = self.nodes.get(id).copied().ok_or_else(|| {
                    Error::InvalidInput(format!("way #{} references unknown node {}", index, id))
                })?;
                coords.push(coord);
            }

            let oneway = Oneway::from_tags(&way.tags);
            let tag = graph
                .tags_mut()
                .add_collection(way.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())));

            let mut start = 0;
            for i in 1..nodes.len() {
                let is_last = i + 1 == nodes.len();
                if !is_last && uses.get(&nodes[i]).copied().unwrap_or(0) < 2 {
                    continue;
                }

                let from = vertex_for(&mut graph, &mut vertex_of, nodes[start], coords[start]);
                let to = vertex_for(&mut graph, &mut vertex_of, nodes[i], coords[i]);
                let points = &coords[start..=i];
                start = i;
                // A closed way with no other junction folds back onto itself
                if from == to {
                    tracing::debug!(way = index, vertex = from, "self-loop segment dropped");
                    continue;
                }

                let weight = to_decimetres(polyline_length(points));
                let shape: Vec<Coordinate> = points[1..points.len() - 1].to_vec();
                let edge = RoadEdge::new(weight).with_tag(tag);

                if oneway != Oneway::Reverse {
                    graph.add_arc(from, to, edge.clone().with_shape(shape.clone()))?;
                    stats.arcs += 1;
                }
                if oneway != Oneway::Forward {
                    let reversed = shape.into_iter().rev().collect();
                    graph.add_arc(to, from, edge.with_shape(reversed))?;
                    stats.arcs += 1;
                }
            }
        }

        stats.vertices = graph.vertex_count();
        tracing::info!(
            ways = stats.ways,
            skipped = stats.skipped_ways,
            vertices = stats.vertices,
            arcs = stats.arcs,
            "graph built"
        );
        Ok((graph, stats))
    }
}

fn vertex_for(
    graph: &mut Graph<RoadEdge>,
    vertex_of: &mut FxHashMap<i64, VertexId>,
    node: i64,
    coord: Coordinate,
) -> VertexId {
    *vertex_of
        .entry(node)
        .or_insert_with(|| graph.add_vertex(coord))
}

fn to_decimetres(metres: f64) -> Weight {
    let dm = (metres * 10.0).round();
    if dm >= (Weight::MAX - 1) as f64 {
        Weight::MAX - 1
    } else {
        dm as Weight
    }
}
