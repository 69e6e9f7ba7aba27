//! CLI commands for atoll-route.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use hdrhistogram::Histogram;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::core::{sweep, CoreDijkstra, QueryOutcome, SearchState};
use crate::filter::{BlockedEdges, RestrictedEdges, PASS_ALL};
use crate::graph::{RoadGraph, WEIGHT_INF};
use crate::hints::{keys, QueryHints};
use crate::matrix::CoreMatrix;
use crate::orchestrator::{CoreConfig, CorePrepSet};
use crate::profiles;
use crate::props::PropertyStore;
use crate::validate::validate_core;
use crate::weighting::create_weighting;

#[derive(Parser)]
#[command(name = "atoll-route")]
#[command(about = "Core contraction hierarchy routing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Contract a graph and report hierarchy statistics
    Prepare {
        /// Graph spec (JSON)
        graph: PathBuf,

        /// Comma-separated weightings to prepare
        #[arg(long, default_value = "fastest")]
        weightings: String,

        /// Vehicle profile
        #[arg(long, default_value = "car")]
        vehicle: String,

        /// Preparation threads
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Restricted edge ids kept out of contraction
        #[arg(long, value_delimiter = ',')]
        restricted: Vec<u32>,

        /// Property file recording preparation stamps
        #[arg(long)]
        props: Option<PathBuf>,
    },

    /// Route one node pair over the prepared core
    Route {
        /// Graph spec (JSON)
        graph: PathBuf,

        /// Source node id
        #[arg(long)]
        from: u32,

        /// Target node id
        #[arg(long)]
        to: u32,

        #[arg(long, default_value = "fastest")]
        weighting: String,

        #[arg(long, default_value = "car")]
        vehicle: String,

        /// Restricted edge ids kept out of contraction
        #[arg(long, value_delimiter = ',')]
        restricted: Vec<u32>,

        /// Edge ids blocked for this query (should be restricted)
        #[arg(long, value_delimiter = ',')]
        blocked: Vec<u32>,

        /// Settled-node budget for the query
        #[arg(long)]
        max_visited: Option<usize>,
    },

    /// Weight table between source and target node lists
    Matrix {
        /// Graph spec (JSON)
        graph: PathBuf,

        #[arg(long, value_delimiter = ',')]
        sources: Vec<u32>,

        #[arg(long, value_delimiter = ',')]
        targets: Vec<u32>,

        #[arg(long, default_value = "fastest")]
        weighting: String,

        #[arg(long, default_value = "car")]
        vehicle: String,

        #[arg(long, value_delimiter = ',')]
        restricted: Vec<u32>,
    },

    /// Settle everything within a weight limit of an origin
    Sweep {
        /// Graph spec (JSON)
        graph: PathBuf,

        /// Origin node id
        #[arg(long)]
        origin: u32,

        /// Weight limit (deciseconds for fastest, millimetres for shortest)
        #[arg(long)]
        limit: u32,

        #[arg(long, default_value = "fastest")]
        weighting: String,

        #[arg(long, default_value = "car")]
        vehicle: String,

        /// Settled-node budget
        #[arg(long)]
        max_visited: Option<usize>,
    },

    /// Compare core answers against plain Dijkstra on random pairs
    Validate {
        /// Graph spec (JSON)
        graph: PathBuf,

        #[arg(long, default_value = "100")]
        pairs: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "fastest")]
        weighting: String,

        #[arg(long, default_value = "car")]
        vehicle: String,

        #[arg(long, value_delimiter = ',')]
        restricted: Vec<u32>,
    },

    /// Query latency percentiles over random pairs
    Bench {
        /// Graph spec (JSON)
        graph: PathBuf,

        #[arg(long, default_value = "1000")]
        queries: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "fastest")]
        weighting: String,

        #[arg(long, default_value = "car")]
        vehicle: String,

        #[arg(long, value_delimiter = ',')]
        restricted: Vec<u32>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare {
                graph,
                weightings,
                vehicle,
                threads,
                restricted,
                props,
            } => {
                let road = load_graph(&graph)?;
                let store = match &props {
                    Some(p) => PropertyStore::open(p)?,
                    None => PropertyStore::in_memory(),
                };
                println!("Preparing [{}] for {}...", weightings, vehicle);
                let start = Instant::now();
                let set = prepare_set(&road, &weightings, &vehicle, threads, &restricted, &store)?;
                for prep in set.preparations() {
                    if let Some(s) = prep.stats() {
                        println!(
                            "✓ {}: {} contracted, {} core nodes, {} shortcuts, {} witness runs, {:.2}s",
                            prep.weighting().file_name(),
                            s.contracted_nodes,
                            s.core_nodes,
                            s.shortcuts,
                            s.witness_runs,
                            s.time_ms as f64 / 1000.0
                        );
                    }
                }
                store.flush()?;
                println!(
                    "✓ All preparations done in {:.2}s",
                    start.elapsed().as_secs_f64()
                );
                if let Some(p) = props {
                    println!("Properties written to {}", p.display());
                }
            }

            Commands::Route {
                graph,
                from,
                to,
                weighting,
                vehicle,
                restricted,
                blocked,
                max_visited,
            } => {
                let road = load_graph(&graph)?;
                check_node(&road, from)?;
                check_node(&road, to)?;
                let store = PropertyStore::in_memory();
                let set = prepare_set(&road, &weighting, &vehicle, 1, &restricted, &store)?;
                let mut hints = QueryHints::new()
                    .with(keys::WEIGHTING, &weighting)
                    .with(keys::VEHICLE, &vehicle);
                if let Some(mv) = max_visited {
                    hints.put(keys::MAX_VISITED, mv);
                }
                let prep = set.resolve(&hints)?;
                let hierarchy = prep.require_hierarchy()?;
                let s = hierarchy.stats();
                println!("Core: {} nodes, {} shortcuts", s.core_nodes, s.n_shortcuts);

                for &e in &blocked {
                    if !restricted.contains(&e) {
                        warn!(edge = e, "blocked edge is not restricted, core answers may differ");
                    }
                }
                let filter: BlockedEdges = blocked.iter().copied().collect();
                let mut dijkstra = CoreDijkstra::new(&road, hierarchy).with_filter(&filter);
                if let Some(mv) = hints.get_usize(keys::MAX_VISITED) {
                    dijkstra = dijkstra.with_budget(mv);
                }

                println!("Routing {} -> {}...", from, to);
                let start = Instant::now();
                match dijkstra.calc_path(from, to) {
                    QueryOutcome::Found(p) => {
                        println!("\nRoute found in {:.3}s", start.elapsed().as_secs_f64());
                        println!("Weight: {}", p.weight);
                        if prep.weighting().is_time_based() {
                            println!("Time: {:.1} minutes", p.weight as f64 / 600.0);
                        }
                        println!("Distance: {:.0}m", p.distance_mm as f64 / 1000.0);
                        println!("Nodes: {}", p.nodes.len());
                    }
                    QueryOutcome::NoRoute => bail!("no route from {} to {}", from, to),
                    QueryOutcome::BudgetExhausted { visited } => {
                        bail!("search budget exhausted after {} settled nodes", visited)
                    }
                }
            }

            Commands::Matrix {
                graph,
                sources,
                targets,
                weighting,
                vehicle,
                restricted,
            } => {
                if sources.is_empty() || targets.is_empty() {
                    bail!("at least one source and one target required");
                }
                let road = load_graph(&graph)?;
                for &v in sources.iter().chain(targets.iter()) {
                    check_node(&road, v)?;
                }
                let store = PropertyStore::in_memory();
                let set = prepare_set(&road, &weighting, &vehicle, 1, &restricted, &store)?;
                let hints = QueryHints::new()
                    .with(keys::WEIGHTING, &weighting)
                    .with(keys::VEHICLE, &vehicle);
                let hierarchy = set.resolve(&hints)?.require_hierarchy()?;

                let matrix = CoreMatrix::new(&road, hierarchy);
                let (weights, stats) = matrix.compute(&sources, &targets);
                println!(
                    "\nMatrix {}x{} in {:.1}ms, {} unreachable, {} settled",
                    stats.n_sources,
                    stats.n_targets,
                    stats.total_time_us as f64 / 1000.0,
                    stats.unreachable,
                    stats.visited
                );
                if sources.len() <= 12 && targets.len() <= 12 {
                    for (i, &src) in sources.iter().enumerate() {
                        let row: Vec<String> = (0..targets.len())
                            .map(|j| {
                                let w = weights[i * targets.len() + j];
                                if w == WEIGHT_INF {
                                    "-".to_string()
                                } else {
                                    w.to_string()
                                }
                            })
                            .collect();
                        println!("  {:>8}: {}", src, row.join(" "));
                    }
                }
            }

            Commands::Sweep {
                graph,
                origin,
                limit,
                weighting,
                vehicle,
                max_visited,
            } => {
                let road = load_graph(&graph)?;
                check_node(&road, origin)?;
                let Some(profile) = profiles::by_name(&vehicle) else {
                    bail!(
                        "unknown vehicle '{}', available: {}",
                        vehicle,
                        profiles::known_names().join(", ")
                    );
                };
                let w = create_weighting(&weighting, profile)?;

                let start = Instant::now();
                let result = sweep(
                    &road,
                    w.as_ref(),
                    &PASS_ALL,
                    origin,
                    limit,
                    max_visited.unwrap_or(usize::MAX),
                );
                println!(
                    "\nReached {} nodes within weight {} in {:.3}s{}",
                    result.reached.len(),
                    limit,
                    start.elapsed().as_secs_f64(),
                    if result.exhausted {
                        " (budget exhausted)"
                    } else {
                        ""
                    }
                );
                for (node, weight) in result.reached.iter().take(10) {
                    println!("  {:>8}: {}", node, weight);
                }
                if result.reached.len() > 10 {
                    println!("  ... and {} more", result.reached.len() - 10);
                }
            }

            Commands::Validate {
                graph,
                pairs,
                seed,
                weighting,
                vehicle,
                restricted,
            } => {
                let road = load_graph(&graph)?;
                let store = PropertyStore::in_memory();
                let set = prepare_set(&road, &weighting, &vehicle, 1, &restricted, &store)?;
                let hints = QueryHints::new()
                    .with(keys::WEIGHTING, &weighting)
                    .with(keys::VEHICLE, &vehicle);
                let prep = set.resolve(&hints)?;
                let hierarchy = prep.require_hierarchy()?;

                let result = validate_core(
                    &road,
                    hierarchy,
                    prep.weighting().as_ref(),
                    &PASS_ALL,
                    pairs,
                    seed,
                );
                result.print();
                if !result.is_valid() {
                    bail!(
                        "hierarchy disagrees with baseline on {} pairs",
                        result.incorrect
                    );
                }
                println!("✓ hierarchy matches baseline");
            }

            Commands::Bench {
                graph,
                queries,
                seed,
                weighting,
                vehicle,
                restricted,
            } => {
                let road = load_graph(&graph)?;
                let store = PropertyStore::in_memory();
                let set = prepare_set(&road, &weighting, &vehicle, 1, &restricted, &store)?;
                let hints = QueryHints::new()
                    .with(keys::WEIGHTING, &weighting)
                    .with(keys::VEHICLE, &vehicle);
                let hierarchy = set.resolve(&hints)?.require_hierarchy()?;

                let dijkstra = CoreDijkstra::new(&road, hierarchy);
                let n = road.n_nodes();
                let mut fwd = SearchState::new(n as usize);
                let mut bwd = SearchState::new(n as usize);
                let mut rng = StdRng::seed_from_u64(seed);
                let mut hist = Histogram::<u64>::new(3)?;
                let mut found = 0u64;

                println!("Running {} queries...", queries);
                let total = Instant::now();
                for i in 0..queries {
                    let s = rng.random_range(0..n);
                    let t = rng.random_range(0..n);
                    let start = Instant::now();
                    let outcome = dijkstra.calc_path_with(s, t, &mut fwd, &mut bwd);
                    hist.record(start.elapsed().as_micros() as u64)?;
                    if outcome.is_found() {
                        found += 1;
                    }
                    if (i + 1) % 100 == 0 || i + 1 == queries {
                        print!("\r  Progress: {}/{}", i + 1, queries);
                        std::io::Write::flush(&mut std::io::stdout())?;
                    }
                }
                let elapsed = total.elapsed().as_secs_f64();
                println!();
                println!();
                print_histogram_stats("Query", &hist);
                println!(
                    "Found {} / {} routes, {:.0} queries/s",
                    found,
                    queries,
                    queries as f64 / elapsed
                );
            }
        }

        Ok(())
    }
}

fn load_graph(path: &PathBuf) -> Result<RoadGraph> {
    println!("Loading graph from {}...", path.display());
    let graph = RoadGraph::load_spec(path)?;
    println!("Graph: {} nodes, {} edges", graph.n_nodes(), graph.n_edges());
    Ok(graph)
}

fn check_node(graph: &RoadGraph, v: u32) -> Result<()> {
    if v >= graph.n_nodes() {
        bail!("node {} out of range, graph has {} nodes", v, graph.n_nodes());
    }
    Ok(())
}

fn prepare_set(
    graph: &RoadGraph,
    weightings: &str,
    vehicle: &str,
    threads: usize,
    restricted: &[u32],
    props: &PropertyStore,
) -> Result<CorePrepSet> {
    let mut cfg = CoreConfig::new();
    cfg.set_weightings(weightings)?;
    cfg.vehicle = vehicle.to_string();
    cfg.preparation_threads = threads;
    let mut set = CorePrepSet::from_config(&cfg)?;
    let restricted: RestrictedEdges = restricted.iter().copied().collect();
    set.prepare_all(graph, &restricted, props)?;
    Ok(set)
}

fn print_histogram_stats(name: &str, hist: &Histogram<u64>) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  {} timing (μs)", name);
    println!("───────────────────────────────────────────────────────────────");
    println!("    min:    {:>10}", hist.min());
    println!("    p50:    {:>10}", hist.value_at_quantile(0.50));
    println!("    p90:    {:>10}", hist.value_at_quantile(0.90));
    println!("    p99:    {:>10}", hist.value_at_quantile(0.99));
    println!("    max:    {:>10}", hist.max());
    println!("    mean:   {:>10.1}", hist.mean());
    println!("    stdev:  {:>10.1}", hist.stdev());
}
