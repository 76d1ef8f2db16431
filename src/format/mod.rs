//! Graph file format
//!
//! All integers little-endian.
//!
//! ```text
//! header    u64 length, UTF-8 version string ("butterfly-ch/1")
//! vertices  u64 size, records of (lat i32, lon i32, level u32), written in
//!           blocks of 4096 records
//! edges     u64 size, records of (source u32, target u32, flags u32,
//!           weight u32, n_shape u32, n_shape × (lat i32, lon i32));
//!           one record per neighbour-list entry
//! tags      u64 size, u32 string count, strings (u32 length + UTF-8),
//!           u32 collection count, (collection, key, value) u32 triples
//!           ended by collection u32::MAX
//! footer    CRC-64 of everything above
//! ```
//!
//! Edge flags: bit 31 shortcut, bit 30 forward-list entry (clear for a
//! backward-list entry), bits 0-29 the via vertex of a shortcut or the tag
//! collection of an original arc, all ones for none.

mod crc;

pub use self::crc::{checksum, CrcReader, CrcWriter};

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::graph::{
    Coordinate, Direction, Graph, Neighbour, RoadEdge, TagStore, VertexId, UNCONTRACTED,
};

/// Version string every graph file starts with
pub const FORMAT_VERSION: &str = "butterfly-ch/1";

const MAX_HEADER_LEN: u64 = 256;
const VERTEX_RECORD: usize = 12;
const VERTEX_BLOCK: usize = 4096;

const FLAG_SHORTCUT: u32 = 1 << 31;
const FLAG_FORWARD: u32 = 1 << 30;
const VALUE_MASK: u32 = (1 << 30) - 1;
const VALUE_NONE: u32 = VALUE_MASK;
const TAGS_END: u32 = u32::MAX;

/// Write `graph` to `path`
pub fn save<P: AsRef<Path>>(graph: &Graph<RoadEdge>, path: P) -> Result<()> {
    let file = File::create(path)?;
    write_to(graph, BufWriter::new(file))
}

/// Read a graph from `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Graph<RoadEdge>> {
    let file = File::open(path)?;
    read_from(BufReader::new(file))
}

pub fn write_to<W: Write>(graph: &Graph<RoadEdge>, writer: W) -> Result<()> {
    let mut w = CrcWriter::new(writer);

    w.write_all(&(FORMAT_VERSION.len() as u64).to_le_bytes())?;
    w.write_all(FORMAT_VERSION.as_bytes())?;

    let vertices: Vec<_> = graph.vertices().collect();
    w.write_all(&((vertices.len() * VERTEX_RECORD) as u64).to_le_bytes())?;
    let mut block = Vec::with_capacity(VERTEX_BLOCK * VERTEX_RECORD);
    for chunk in vertices.chunks(VERTEX_BLOCK) {
        block.clear();
        for v in chunk {
            block.extend_from_slice(&v.coord.lat_fxp.to_le_bytes());
            block.extend_from_slice(&v.coord.lon_fxp.to_le_bytes());
            block.extend_from_slice(&v.level.to_le_bytes());
        }
        w.write_all(&block)?;
    }

    let mut edges = Vec::new();
    for v in &vertices {
        for direction in [Direction::Forward, Direction::Backward] {
            for n in v.neighbours(direction) {
                encode_edge(&mut edges, v.id, direction, n)?;
            }
        }
    }
    write_section(&mut w, &edges)?;

    let tags = encode_tags(graph.tags());
    write_section(&mut w, &tags)?;

    w.finish()?;

    tracing::info!(
        vertices = vertices.len(),
        edge_bytes = edges.len(),
        tag_bytes = tags.len(),
        "graph written"
    );
    Ok(())
}

pub fn read_from<R: Read>(reader: R) -> Result<Graph<RoadEdge>> {
    let mut r = CrcReader::new(reader);
    read_header(&mut r)?;

    let vertices = read_section(&mut r, "vertices")?;
    if vertices.len() % VERTEX_RECORD != 0 {
        return Err(Error::Corrupt(format!(
            "vertices section size {} is not a multiple of {}",
            vertices.len(),
            VERTEX_RECORD
        )));
    }
    let mut graph = Graph::with_capacity(vertices.len() / VERTEX_RECORD);
    let mut bytes = Bytes::new(&vertices, "vertices");
    while !bytes.is_empty() {
        let lat_fxp = bytes.i32()?;
        let lon_fxp = bytes.i32()?;
        let level = bytes.u32()?;
        let id = graph.add_vertex(Coordinate { lat_fxp, lon_fxp });
        if level != UNCONTRACTED {
            graph.set_level(id, level);
        }
    }

    let edges = read_section(&mut r, "edges")?;
    decode_edges(&mut graph, &edges)?;

    let tags = read_section(&mut r, "tags")?;
    *graph.tags_mut() = decode_tags(&tags)?;
    check_tag_refs(&graph)?;

    let (computed, stored) = r.finish().map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Corrupt("missing checksum footer".to_string()),
        _ => Error::Io(e),
    })?;
    if computed != stored {
        return Err(Error::Corrupt(format!(
            "checksum mismatch: computed {:016x}, stored {:016x}",
            computed, stored
        )));
    }

    tracing::info!(
        vertices = graph.vertex_count(),
        arcs = graph.arc_count(),
        "graph loaded"
    );
    Ok(graph)
}

fn read_header<R: Read>(r: &mut R) -> Result<()> {
    let mut len = [0u8; 8];
    r.read_exact(&mut len)
        .map_err(|_| Error::InvalidHeader("stream too short for a header".to_string()))?;
    let len = u64::from_le_bytes(len);
    if len > MAX_HEADER_LEN {
        return Err(Error::InvalidHeader(format!(
            "header length {} exceeds {}",
            len, MAX_HEADER_LEN
        )));
    }

    let mut text = vec![0u8; len as usize];
    r.read_exact(&mut text)
        .map_err(|_| Error::InvalidHeader("truncated version string".to_string()))?;
    let found = String::from_utf8(text)
        .map_err(|_| Error::InvalidHeader("version string is not UTF-8".to_string()))?;

    if found != FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            expected: FORMAT_VERSION.to_string(),
            found,
        });
    }
    Ok(())
}

fn write_section<W: Write>(w: &mut W, data: &[u8]) -> Result<()> {
    w.write_all(&(data.len() as u64).to_le_bytes())?;
    w.write_all(data)?;
    Ok(())
}

fn read_section<R: Read>(r: &mut R, name: &str) -> Result<Vec<u8>> {
    let mut size = [0u8; 8];
    r.read_exact(&mut size).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Corrupt(format!("{} section missing", name)),
        _ => Error::Io(e),
    })?;
    let size = u64::from_le_bytes(size);

    let mut data = Vec::new();
    r.by_ref().take(size).read_to_end(&mut data)?;
    if data.len() as u64 != size {
        return Err(Error::Corrupt(format!(
            "{} section truncated: {} of {} bytes",
            name,
            data.len(),
            size
        )));
    }
    Ok(data)
}

fn encode_edge(
    out: &mut Vec<u8>,
    owner: VertexId,
    direction: Direction,
    n: &Neighbour<RoadEdge>,
) -> Result<()> {
    let (source, target) = match direction {
        Direction::Forward => (owner, n.target),
        Direction::Backward => (n.target, owner),
    };
    let value = match (n.edge.via, n.edge.tag) {
        (Some(via), _) => via,
        (None, Some(tag)) => tag,
        (None, None) => VALUE_NONE,
    };
    let has_value = n.edge.via.is_some() || n.edge.tag.is_some();
    if value > VALUE_MASK || (has_value && value == VALUE_NONE) {
        return Err(Error::InvalidInput(format!(
            "arc {} → {}: id {} does not fit in 30 bits",
            source, target, value
        )));
    }

    let mut flags = value;
    if n.edge.via.is_some() {
        flags |= FLAG_SHORTCUT;
    }
    if direction == Direction::Forward {
        flags |= FLAG_FORWARD;
    }

    for x in [source, target, flags, n.edge.weight, n.edge.shape.len() as u32] {
        out.extend_from_slice(&x.to_le_bytes());
    }
    for c in &n.edge.shape {
        out.extend_from_slice(&c.lat_fxp.to_le_bytes());
        out.extend_from_slice(&c.lon_fxp.to_le_bytes());
    }
    Ok(())
}

fn decode_edges(graph: &mut Graph<RoadEdge>, data: &[u8]) -> Result<()> {
    let n_vertices = graph.vertex_count() as u64;
    let mut bytes = Bytes::new(data, "edges");

    while !bytes.is_empty() {
        let source = bytes.u32()?;
        let target = bytes.u32()?;
        let flags = bytes.u32()?;
        let weight = bytes.u32()?;
        let n_shape = bytes.u32()? as usize;

        if source as u64 >= n_vertices || target as u64 >= n_vertices {
            return Err(Error::Corrupt(format!(
                "edge {} → {} references a vertex beyond {}",
                source, target, n_vertices
            )));
        }
        if source == target {
            return Err(Error::Corrupt(format!("self-loop arc at vertex {}", source)));
        }
        if n_shape.saturating_mul(8) > bytes.remaining() {
            return Err(Error::Corrupt(format!(
                "edge {} → {} declares {} shape points past the section end",
                source, target, n_shape
            )));
        }
        let mut shape = Vec::with_capacity(n_shape);
        for _ in 0..n_shape {
            let lat_fxp = bytes.i32()?;
            let lon_fxp = bytes.i32()?;
            shape.push(Coordinate { lat_fxp, lon_fxp });
        }

        let value = flags & VALUE_MASK;
        let value = (value != VALUE_NONE).then_some(value);
        let shortcut = flags & FLAG_SHORTCUT != 0;
        if let Some(via) = value.filter(|_| shortcut) {
            if via as u64 >= n_vertices || via == source || via == target {
                return Err(Error::Corrupt(format!(
                    "shortcut {} → {} bypasses invalid vertex {}",
                    source, target, via
                )));
            }
        }
        let edge = if shortcut {
            RoadEdge {
                weight,
                via: value,
                tag: None,
                shape,
            }
        } else {
            RoadEdge {
                weight,
                via: None,
                tag: value,
                shape,
            }
        };

        if flags & FLAG_FORWARD != 0 {
            graph.push_entry(source, Direction::Forward, Neighbour::new(target, edge));
        } else {
            graph.push_entry(target, Direction::Backward, Neighbour::new(source, edge));
        }
    }
    Ok(())
}

/// Every tagged arc must name a collection present in the tags section
fn check_tag_refs(graph: &Graph<RoadEdge>) -> Result<()> {
    let n_collections = graph.tags().collection_count();
    for v in graph.vertices() {
        for n in v.forward.iter().chain(v.backward.iter()) {
            if let Some(tag) = n.edge.tag {
                if tag as usize >= n_collections {
                    return Err(Error::Corrupt(format!(
                        "arc at vertex {} references tag collection {} of {}",
                        v.id, tag, n_collections
                    )));
                }
            }
        }
    }
    Ok(())
}

fn encode_tags(tags: &TagStore) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(tags.strings().len() as u32).to_le_bytes());
    for s in tags.strings() {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }
    out.extend_from_slice(&(tags.collection_count() as u32).to_le_bytes());
    for (collection, key, value) in tags.triples() {
        for x in [collection, key, value] {
            out.extend_from_slice(&x.to_le_bytes());
        }
    }
    out.extend_from_slice(&TAGS_END.to_le_bytes());
    out
}

fn decode_tags(data: &[u8]) -> Result<TagStore> {
    let mut bytes = Bytes::new(data, "tags");

    let n_strings = bytes.u32()? as usize;
    let mut strings = Vec::with_capacity(n_strings.min(bytes.remaining() / 4));
    for _ in 0..n_strings {
        let len = bytes.u32()? as usize;
        let raw = bytes.take(len)?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| Error::Corrupt("tag string is not UTF-8".to_string()))?;
        strings.push(s.to_string());
    }

    let n_collections = bytes.u32()? as usize;
    let mut triples = Vec::new();
    loop {
        let collection = bytes.u32()?;
        if collection == TAGS_END {
            break;
        }
        let key = bytes.u32()?;
        let value = bytes.u32()?;
        if collection as usize >= n_collections
            || key as usize >= strings.len()
            || value as usize >= strings.len()
        {
            return Err(Error::Corrupt(format!(
                "tag triple ({}, {}, {}) out of range",
                collection, key, value
            )));
        }
        triples.push((collection, key, value));
    }

    if !bytes.is_empty() {
        return Err(Error::Corrupt(format!(
            "{} trailing bytes after tag terminator",
            bytes.remaining()
        )));
    }
    Ok(TagStore::from_parts(strings, n_collections, triples))
}

/// Bounds-checked little-endian cursor over one section
struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
    section: &'static str,
}

impl<'a> Bytes<'a> {
    fn new(data: &'a [u8], section: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            section,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Corrupt(format!(
                "{} section ends inside a record at byte {}",
                self.section, self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::{ContractionConfig, Preprocessor};
    use tempfile::NamedTempFile;

    fn sample() -> Graph {
        let mut g = Graph::new();
        for i in 0..5 {
            g.add_vertex(Coordinate::new(50.0 + i as f64 * 0.001, 4.0));
        }
        let primary = g.tags_mut().add_collection([("highway", "primary")]);
        let zone = g
            .tags_mut()
            .add_collection([("highway", "service"), ("access", "destination")]);
        let bend = vec![Coordinate::new(50.0005, 4.0003)];
        g.add_arc(0, 1, RoadEdge::new(70).with_tag(primary).with_shape(bend))
            .unwrap();
        g.add_arc(1, 0, RoadEdge::new(70).with_tag(primary)).unwrap();
        g.add_arc(1, 2, RoadEdge::new(11).with_tag(zone)).unwrap();
        g.add_arc(2, 3, RoadEdge::new(12)).unwrap();
        g.add_arc(3, 4, RoadEdge::new(13)).unwrap();
        g.add_arc(4, 0, RoadEdge::new(50)).unwrap();
        g
    }

    fn contracted() -> Graph {
        let g = sample();
        let mut pre = Preprocessor::new(g.clone(), ContractionConfig::default());
        pre.start(g.ids());
        pre.into_graph()
    }

    fn bytes_of(g: &Graph) -> Vec<u8> {
        let mut out = Vec::new();
        write_to(g, &mut out).unwrap();
        out
    }

    #[test]
    fn test_contracted_graph_survives_file() {
        let g = contracted();
        let file = NamedTempFile::new().unwrap();
        save(&g, file.path()).unwrap();
        let loaded = load(file.path()).unwrap();

        assert_eq!(loaded.vertex_count(), g.vertex_count());
        assert_eq!(loaded.shortcut_count(), g.shortcut_count());
        for (a, b) in g.vertices().zip(loaded.vertices()) {
            assert_eq!(a.coord, b.coord);
            assert_eq!(a.level, b.level);
            assert_eq!(a.forward, b.forward);
            assert_eq!(a.backward, b.backward);
        }
        assert_eq!(loaded.tags(), g.tags());
        assert_eq!(loaded.tags().get(1, "access"), Some("destination"));
        assert!(loaded.check_symmetry().is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let mut data = bytes_of(&sample());
        // Same length, different version digit
        let last = 8 + FORMAT_VERSION.len() - 1;
        data[last] = b'0';
        match read_from(&data[..]) {
            Err(Error::VersionMismatch { expected, found }) => {
                assert_eq!(expected, FORMAT_VERSION);
                assert_eq!(found, "butterfly-ch/0");
            }
            other => panic!("expected a version mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut data = (1_000_000u64).to_le_bytes().to_vec();
        data.extend_from_slice(&[b'x'; 64]);
        assert!(matches!(read_from(&data[..]), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_non_utf8_header_rejected() {
        let mut data = 2u64.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(read_from(&data[..]), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_truncated_file_fails() {
        let data = bytes_of(&sample());
        for cut in [data.len() - 4, data.len() / 2, 30] {
            let err = read_from(&data[..cut]).map(|_| ()).unwrap_err();
            assert!(matches!(err, Error::Corrupt(_)), "cut {}: {:?}", cut, err);
        }
    }

    #[test]
    fn test_checksum_detects_bit_flip() {
        let mut data = bytes_of(&sample());
        // First byte of the first vertex latitude
        let offset = 8 + FORMAT_VERSION.len() + 8;
        data[offset] ^= 0x01;
        let err = read_from(&data[..]).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("checksum"), "{}", err);
    }

    #[test]
    fn test_edge_to_unknown_vertex_is_corrupt() {
        let mut g = Graph::new();
        g.add_vertex(Coordinate::new(50.0, 4.0));
        g.push_entry(0, Direction::Forward, Neighbour::new(7, RoadEdge::new(1)));
        let data = bytes_of(&g);
        assert!(matches!(read_from(&data[..]), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_shortcut_via_out_of_range_is_corrupt() {
        let mut g = Graph::new();
        g.add_vertex(Coordinate::new(50.0, 4.0));
        g.add_vertex(Coordinate::new(50.0, 4.001));
        let bogus = RoadEdge {
            weight: 3,
            via: Some(99),
            ..Default::default()
        };
        g.push_entry(0, Direction::Forward, Neighbour::new(1, bogus));
        let err = read_from(&bytes_of(&g)[..]).map(|_| ()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "{:?}", err);
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_unknown_tag_collection_is_corrupt() {
        let mut g = Graph::new();
        g.add_vertex(Coordinate::new(50.0, 4.0));
        g.add_vertex(Coordinate::new(50.0, 4.001));
        g.add_arc(0, 1, RoadEdge::new(5).with_tag(4)).unwrap();
        let err = read_from(&bytes_of(&g)[..]).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("tag collection 4"), "{}", err);
    }

    #[test]
    fn test_self_loop_is_corrupt() {
        let mut g = Graph::new();
        g.add_vertex(Coordinate::new(50.0, 4.0));
        g.push_entry(0, Direction::Forward, Neighbour::new(0, RoadEdge::new(1)));
        assert!(matches!(read_from(&bytes_of(&g)[..]), Err(Error::Corrupt(_))));
    }
}
