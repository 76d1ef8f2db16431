//! End-to-end tests: ingest → contract → save → load → query
//!
//! The last tests drive the `butterfly-ch` binary the same way a user would.

use butterfly_ch::{
    format, validate_ch, ArcChange, ChQuery, ChangeType, ContractionConfig, Coordinate, Dijkstra,
    Graph, GraphBuilder, Preprocessor, SpatialIndex, VisitList, UNCONTRACTED, UNREACHABLE,
};
use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

const ROWS: i64 = 6;
const COLS: i64 = 6;

fn node_id(r: i64, c: i64) -> i64 {
    1000 + r * COLS + c
}

/// A small town grid: horizontal streets are one-way in alternating
/// directions, vertical streets are two-way, with one extra node in the
/// middle of every vertical segment.
fn town() -> GraphBuilder {
    let mut b = GraphBuilder::new();
    for r in 0..ROWS {
        for c in 0..COLS {
            b.process_node_create(
                node_id(r, c),
                50.80 + r as f64 * 0.002,
                4.30 + c as f64 * 0.003,
                ChangeType::Create,
            )
            .unwrap();
            if r + 1 < ROWS {
                b.process_node_create(
                    -node_id(r, c),
                    50.80 + r as f64 * 0.002 + 0.001,
                    4.30 + c as f64 * 0.003 + 0.0002,
                    ChangeType::Create,
                )
                .unwrap();
            }
        }
    }

    for r in 0..ROWS {
        let nodes: Vec<i64> = (0..COLS).map(|c| node_id(r, c)).collect();
        let oneway = if r % 2 == 0 { "yes" } else { "-1" };
        b.process_way_create(
            nodes,
            vec![
                ("highway".to_string(), "residential".to_string()),
                ("oneway".to_string(), oneway.to_string()),
            ],
            ChangeType::Create,
        )
        .unwrap();
    }
    for c in 0..COLS {
        let mut nodes = Vec::new();
        for r in 0..ROWS {
            nodes.push(node_id(r, c));
            if r + 1 < ROWS {
                nodes.push(-node_id(r, c));
            }
        }
        b.process_way_create(
            nodes,
            vec![("highway".to_string(), "tertiary".to_string())],
            ChangeType::Create,
        )
        .unwrap();
    }
    b
}

fn contract(graph: &Graph) -> (Graph, Vec<ArcChange>) {
    let ids: Vec<_> = graph.ids().collect();
    let mut pre = Preprocessor::new(graph.clone(), ContractionConfig::default())
        .with_listener(Vec::<ArcChange>::new());
    pre.start(ids);
    pre.into_parts()
}

#[test]
fn test_ingest_builds_junction_graph() {
    let graph = town().build().unwrap();
    // Every grid node is a junction; the mid-segment nodes are shape points
    assert_eq!(graph.vertex_count(), (ROWS * COLS) as usize);
    let vertical_arcs = 2 * (ROWS - 1) * COLS;
    let horizontal_arcs = ROWS * (COLS - 1);
    assert_eq!(graph.arc_count(), (vertical_arcs + horizontal_arcs) as usize);
    assert!(graph.check_symmetry().is_ok());
}

#[test]
fn test_full_pipeline_matches_dijkstra() {
    let graph = town().build().unwrap();
    let (ch, changes) = contract(&graph);

    let mut levels: Vec<u32> = ch.vertices().map(|v| v.level).collect();
    levels.sort_unstable();
    let expected: Vec<u32> = (1..=graph.vertex_count() as u32).collect();
    assert_eq!(levels, expected);
    assert!(!levels.contains(&UNCONTRACTED));
    assert!(ch.check_symmetry().is_ok());

    let added = changes
        .iter()
        .filter(|c| matches!(c, ArcChange::Added { .. }))
        .count();
    assert_eq!(added, ch.shortcut_count());

    let file = NamedTempFile::new().unwrap();
    format::save(&ch, file.path()).unwrap();
    let loaded = format::load(file.path()).unwrap();
    assert_eq!(loaded.vertex_count(), ch.vertex_count());
    assert_eq!(loaded.arc_count(), ch.arc_count());

    let query = ChQuery::new(&loaded);
    let plain = Dijkstra::new(&graph);
    let targets: Vec<VisitList> = graph.ids().map(VisitList::single).collect();
    for s in graph.ids() {
        let expected = plain.weights_one_to_many(&VisitList::single(s), &targets);
        for t in graph.ids() {
            let got = query.distance(s, t).unwrap_or(UNREACHABLE);
            assert_eq!(got, expected[t as usize], "{} → {}", s, t);
        }
    }
}

#[test]
fn test_validation_on_ingested_graph() {
    let graph = town().build().unwrap();
    let (ch, _) = contract(&graph);
    let result = validate_ch(&graph, &ch, 300, 7);
    assert!(result.is_valid(), "{:?}", result.samples);
}

#[test]
fn test_snapped_route_on_contracted_graph() {
    let graph = town().build().unwrap();
    let (ch, _) = contract(&graph);
    let index = SpatialIndex::build(&graph);
    assert!(!index.is_empty());

    // Halfway along two vertical streets
    let from = index
        .resolve(Coordinate::new(50.8031, 4.3002), 0.002)
        .unwrap();
    let to = index
        .resolve(Coordinate::new(50.8071, 4.3152), 0.002)
        .unwrap();

    let plain = Dijkstra::new(&graph)
        .route_to(&from.as_source(), &to.as_target())
        .unwrap();
    let fast = ChQuery::new(&ch)
        .route(&from.as_source(), &to.as_target())
        .unwrap();
    assert_eq!(plain.weight, fast.weight);
    let first = fast.source().unwrap();
    assert!(from.as_source().vertices().any(|v| v == first));
    let last = fast.target().unwrap();
    assert!(to.as_target().vertices().any(|v| v == last));
}

#[test]
fn test_range_grows_with_bound() {
    let graph = town().build().unwrap();
    let search = Dijkstra::new(&graph);
    let start = VisitList::single(0);
    let small = search.range(&start, 3000);
    let large = search.range(&start, 6000);
    assert!(small.contains(&0));
    assert!(small.len() <= large.len());
    assert!(small.iter().all(|v| large.contains(v)));
}

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_butterfly-ch"))
}

#[test]
fn test_cli_build_contract_validate() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.jsonl");
    let graph = dir.path().join("graph.bch");
    let ch = dir.path().join("ch.bch");
    let changes = dir.path().join("changes.jsonl");

    {
        let mut f = std::fs::File::create(&events).unwrap();
        let nodes = [
            (1, 50.0, 4.0),
            (2, 50.0, 4.001),
            (3, 50.001, 4.001),
            (4, 50.001, 4.0),
        ];
        for (id, lat, lon) in nodes {
            writeln!(f, r#"{{"type":"node","id":{},"lat":{},"lon":{}}}"#, id, lat, lon).unwrap();
        }
        for way in [
            r#"{"type":"way","nodes":[1,2,3,4,1],"tags":{"highway":"residential"}}"#,
            r#"{"type":"way","nodes":[1,3],"tags":{"highway":"service","oneway":"yes"}}"#,
        ] {
            writeln!(f, "{}", way).unwrap();
        }
    }

    let out = bin().arg("build").arg(&events).arg(&graph).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stats: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    // Nodes 2 and 4 only carry shape
    assert_eq!(stats["vertices"], 2);

    let out = bin()
        .arg("contract")
        .arg(&graph)
        .arg(&ch)
        .arg("--changes")
        .arg(&changes)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["contracted"], 2);
    let lines = std::fs::read_to_string(&changes).unwrap();
    assert_eq!(lines.lines().count() as u64, summary["changes_written"].as_u64().unwrap());

    let out = bin()
        .arg("validate")
        .arg(&graph)
        .arg(&ch)
        .arg("--pairs")
        .arg("50")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = bin()
        .arg("route")
        .arg(&ch)
        .arg("--from")
        .arg("50.0,4.0")
        .arg("--to")
        .arg("50.001,4.001")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let route: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(route["weight"].as_u64().unwrap() > 0);
}

#[test]
fn test_cli_rejects_modify_events() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.jsonl");
    std::fs::write(
        &events,
        r#"{"type":"node","id":1,"lat":50.0,"lon":4.0,"change":"modify"}"#,
    )
    .unwrap();

    let out = bin()
        .arg("build")
        .arg(&events)
        .arg(dir.path().join("graph.bch"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("modify"));
}
