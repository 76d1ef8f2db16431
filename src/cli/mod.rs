//! Command-line helpers for butterfly-ch
//!
//! Coordinate parsing, point snapping and JSON output shared by the
//! subcommands in `main.rs`.

pub mod changes;
pub mod progress;

use anyhow::{bail, Context, Result};
use butterfly_ch::{Coordinate, Direction, EdgeData, Graph, Path, Snap, SpatialIndex, VertexId};
use serde::Serialize;

pub use changes::JsonLinesListener;
pub use progress::create_progress_bar;

/// Parse "lat,lon"
pub fn parse_coord(s: &str) -> Result<Coordinate> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        bail!("Coordinate must be in format 'lat,lon', got '{}'", s);
    }
    let lat: f64 = parts[0]
        .trim()
        .parse()
        .with_context(|| format!("Invalid latitude in '{}'", s))?;
    let lon: f64 = parts[1]
        .trim()
        .parse()
        .with_context(|| format!("Invalid longitude in '{}'", s))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("Coordinate out of range: '{}'", s);
    }
    Ok(Coordinate::new(lat, lon))
}

/// Resolve a "lat,lon" argument onto the road network
pub fn snap(index: &SpatialIndex, arg: &str, radius_deg: f64) -> Result<Snap> {
    let coord = parse_coord(arg)?;
    index
        .resolve(coord, radius_deg)
        .with_context(|| format!("No road within {}° of {}", radius_deg, arg))
}

/// Whether any vertex carries a contraction level
pub fn is_contracted<E: EdgeData>(graph: &Graph<E>) -> bool {
    graph.vertices().any(|v| v.is_contracted())
}

#[derive(Serialize)]
pub struct RouteOutput {
    pub weight: u32,
    pub vertices: Vec<VertexId>,
    /// `[lat, lon]` per vertex, including edge shape points
    pub geometry: Vec<[f64; 2]>,
}

impl RouteOutput {
    pub fn new(graph: &Graph, path: Path) -> Self {
        let mut geometry = Vec::with_capacity(path.vertices.len());
        for (i, &v) in path.vertices.iter().enumerate() {
            if i > 0 {
                let prev = path.vertices[i - 1];
                // In a contracted graph the arc may only survive on the lower endpoint
                let forward = graph
                    .neighbours(prev, Direction::Forward)
                    .iter()
                    .filter(|n| n.target == v);
                let backward = graph
                    .neighbours(v, Direction::Backward)
                    .iter()
                    .filter(|n| n.target == prev);
                let arc = forward
                    .chain(backward)
                    .filter(|n| n.edge.via.is_none())
                    .min_by_key(|n| n.weight());
                if let Some(arc) = arc {
                    geometry.extend(arc.edge.shape.iter().map(|c| [c.lat(), c.lon()]));
                }
            }
            let c = graph.vertex(v).coord;
            geometry.push([c.lat(), c.lon()]);
        }
        Self {
            weight: path.weight,
            vertices: path.vertices,
            geometry,
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{}", out);
    Ok(())
}
