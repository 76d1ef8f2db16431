//! # Butterfly-ch CLI
//!
//! Builds road graphs from JSON-lines ingestion events, contracts them and
//! answers routing queries. Results go to stdout as JSON, logs to stderr.

use anyhow::{bail, Context, Result};
use butterfly_ch::{
    format, validate_ch, ChQuery, ContractionConfig, Dijkstra, GraphBuilder, IngestEvent,
    Preprocessor, VisitList,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod cli;

/// Default snapping radius in degrees (roughly 500 m)
const DEFAULT_SNAP_RADIUS: f64 = 0.005;

#[derive(Parser)]
#[command(name = "butterfly-ch")]
#[command(about = "Contraction Hierarchy preprocessing and routing for road networks")]
#[command(long_about = "Builds and queries road graphs:
  butterfly-ch build events.jsonl graph.bch       # JSON-lines node/way events to graph
  butterfly-ch contract graph.bch ch.bch           # Contract a graph
  butterfly-ch route ch.bch --from 50.85,4.35 --to 50.84,4.36
  butterfly-ch validate graph.bch ch.bch --pairs 1000

Logging goes to stderr and honours RUST_LOG.")]
#[command(version = env!("BUTTERFLY_VERSION"))]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from JSON-lines node/way create events ("-" reads stdin)
    Build {
        input: PathBuf,
        output: PathBuf,
    },
    /// Contract a graph into a Contraction Hierarchy
    Contract {
        input: PathBuf,
        output: PathBuf,
        /// Write every arc change as a JSON line to this file
        #[arg(long)]
        changes: Option<PathBuf>,
        /// Stale queue minima tolerated before a full re-scoring pass
        #[arg(long, default_value_t = 256)]
        max_misses: usize,
        /// Cap on vertices settled per witness search
        #[arg(long)]
        witness_limit: Option<usize>,
        /// Run witness searches on a single thread
        #[arg(long)]
        sequential: bool,
    },
    /// Shortest route between two coordinates
    Route {
        graph: PathBuf,
        /// Start coordinate (lat,lon)
        #[arg(long)]
        from: String,
        /// End coordinate (lat,lon)
        #[arg(long)]
        to: String,
        /// Snapping radius in degrees
        #[arg(long, default_value_t = DEFAULT_SNAP_RADIUS)]
        radius: f64,
    },
    /// Weight matrix between sets of coordinates (uncontracted graph)
    Matrix {
        graph: PathBuf,
        /// Source coordinate (lat,lon), repeatable
        #[arg(long = "source", required = true)]
        sources: Vec<String>,
        /// Target coordinate (lat,lon), repeatable
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SNAP_RADIUS)]
        radius: f64,
    },
    /// Vertices reachable within a weight bound (uncontracted graph)
    Range {
        graph: PathBuf,
        /// Start coordinate (lat,lon)
        #[arg(long)]
        from: String,
        /// Weight bound in decimetres
        #[arg(long)]
        bound: u32,
        /// Report the frontier just beyond the bound instead
        #[arg(long)]
        frontier: bool,
        #[arg(long, default_value_t = DEFAULT_SNAP_RADIUS)]
        radius: f64,
    },
    /// Compare CH distances against plain Dijkstra on random pairs
    Validate {
        original: PathBuf,
        contracted: PathBuf,
        #[arg(long, default_value_t = 1000)]
        pairs: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = run(cli) {
        tracing::error!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("butterfly_ch=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { input, output } => build(&input, &output),
        Commands::Contract {
            input,
            output,
            changes,
            max_misses,
            witness_limit,
            sequential,
        } => {
            let config = ContractionConfig {
                max_consecutive_misses: max_misses,
                witness_settle_limit: witness_limit,
                parallel_witness: !sequential,
                ..Default::default()
            };
            contract(&input, &output, changes.as_deref(), config)
        }
        Commands::Route {
            graph,
            from,
            to,
            radius,
        } => route(&graph, &from, &to, radius),
        Commands::Matrix {
            graph,
            sources,
            targets,
            radius,
        } => matrix(&graph, &sources, &targets, radius),
        Commands::Range {
            graph,
            from,
            bound,
            frontier,
            radius,
        } => range(&graph, &from, bound, frontier, radius),
        Commands::Validate {
            original,
            contracted,
            pairs,
            seed,
        } => validate(&original, &contracted, pairs, seed),
    }
}

fn load_graph(path: &Path) -> Result<butterfly_ch::Graph> {
    let start = Instant::now();
    let graph = format::load(path)
        .with_context(|| format!("Failed to load graph {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        vertices = graph.vertex_count(),
        arcs = graph.arc_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "graph loaded"
    );
    Ok(graph)
}

fn build(input: &Path, output: &Path) -> Result<()> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file =
            File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut builder = GraphBuilder::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: IngestEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", i + 1))?;
        builder
            .apply(event)
            .with_context(|| format!("Rejected event on line {}", i + 1))?;
    }

    let (graph, stats) = builder.build_with_stats().context("Failed to build graph")?;
    format::save(&graph, output).with_context(|| format!("Failed to write {}", output.display()))?;
    cli::print_json(&stats)
}

#[derive(Serialize)]
struct ContractOutput {
    #[serde(flatten)]
    stats: butterfly_ch::ContractionStats,
    arcs: usize,
    shortcuts: usize,
    changes_written: Option<usize>,
}

fn contract(
    input: &Path,
    output: &Path,
    changes: Option<&Path>,
    config: ContractionConfig,
) -> Result<()> {
    let graph = load_graph(input)?;
    if cli::is_contracted(&graph) {
        bail!("{} is already contracted", input.display());
    }
    let ids: Vec<_> = graph.ids().collect();

    let (graph, stats, changes_written) = match changes {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let listener = cli::JsonLinesListener::new(BufWriter::new(file));
            let mut pre = Preprocessor::new(graph, config).with_listener(listener);
            let stats = pre.start(ids);
            let (graph, listener) = pre.into_parts();
            let written = listener
                .finish()
                .with_context(|| format!("Failed to write changes to {}", path.display()))?;
            (graph, stats, Some(written))
        }
        None => {
            let mut pre = Preprocessor::new(graph, config);
            let stats = pre.start(ids);
            (pre.into_graph(), stats, None)
        }
    };

    format::save(&graph, output).with_context(|| format!("Failed to write {}", output.display()))?;
    cli::print_json(&ContractOutput {
        stats,
        arcs: graph.arc_count(),
        shortcuts: graph.shortcut_count(),
        changes_written,
    })
}

fn route(path: &Path, from: &str, to: &str, radius: f64) -> Result<()> {
    let graph = load_graph(path)?;
    let index = butterfly_ch::SpatialIndex::build(&graph);
    let source = cli::snap(&index, from, radius)?.as_source();
    let target = cli::snap(&index, to, radius)?.as_target();

    let found = if cli::is_contracted(&graph) {
        ChQuery::new(&graph).route(&source, &target)
    } else {
        Dijkstra::new(&graph).route_to(&source, &target)
    };
    let path = found.with_context(|| format!("No route from {} to {}", from, to))?;
    cli::print_json(&cli::RouteOutput::new(&graph, path))
}

fn require_uncontracted(graph: &butterfly_ch::Graph, path: &Path) -> Result<()> {
    if cli::is_contracted(graph) {
        bail!(
            "{} is contracted; plain searches need the uncontracted graph",
            path.display()
        );
    }
    Ok(())
}

fn matrix(path: &Path, sources: &[String], targets: &[String], radius: f64) -> Result<()> {
    let graph = load_graph(path)?;
    require_uncontracted(&graph, path)?;
    let index = butterfly_ch::SpatialIndex::build(&graph);

    let sources: Vec<VisitList> = sources
        .iter()
        .map(|s| cli::snap(&index, s, radius).map(|snap| snap.as_source()))
        .collect::<Result<_>>()?;
    let targets: Vec<VisitList> = targets
        .iter()
        .map(|s| cli::snap(&index, s, radius).map(|snap| snap.as_target()))
        .collect::<Result<_>>()?;

    let pb = cli::create_progress_bar(sources.len() as u64);
    let matrix = Dijkstra::new(&graph).route_many_to_many(&sources, &targets, Some(&pb));
    pb.finish_and_clear();
    cli::print_json(&matrix)
}

#[derive(Serialize)]
struct RangeOutput {
    bound: u32,
    frontier: bool,
    vertices: Vec<butterfly_ch::VertexId>,
}

fn range(path: &Path, from: &str, bound: u32, frontier: bool, radius: f64) -> Result<()> {
    let graph = load_graph(path)?;
    require_uncontracted(&graph, path)?;
    let index = butterfly_ch::SpatialIndex::build(&graph);
    let source = cli::snap(&index, from, radius)?.as_source();

    let search = Dijkstra::new(&graph);
    let mut vertices = if frontier {
        search.range_frontier(&source, bound)
    } else {
        search.range(&source, bound)
    };
    vertices.sort_unstable();
    cli::print_json(&RangeOutput {
        bound,
        frontier,
        vertices,
    })
}

fn validate(original: &Path, contracted: &Path, pairs: usize, seed: u64) -> Result<()> {
    let original_graph = load_graph(original)?;
    let contracted_graph = load_graph(contracted)?;
    require_uncontracted(&original_graph, original)?;
    if original_graph.vertex_count() != contracted_graph.vertex_count() {
        bail!(
            "Vertex counts differ: {} has {}, {} has {}",
            original.display(),
            original_graph.vertex_count(),
            contracted.display(),
            contracted_graph.vertex_count()
        );
    }
    original_graph
        .check_symmetry()
        .map_err(|e| anyhow::anyhow!("{} breaks neighbour symmetry: {}", original.display(), e))?;
    contracted_graph
        .check_symmetry()
        .map_err(|e| anyhow::anyhow!("{} breaks neighbour symmetry: {}", contracted.display(), e))?;

    let result = validate_ch(&original_graph, &contracted_graph, pairs, seed);
    cli::print_json(&result)?;
    if !result.is_valid() {
        bail!("{} of {} pairs disagree", result.mismatches, result.checked);
    }
    Ok(())
}
