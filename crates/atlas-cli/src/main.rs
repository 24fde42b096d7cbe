//! CLI binary for mcp-atlas: build, load, and query the registry knowledge
//! graph. All real logic lives in `atlas-pipeline`; this is argument
//! parsing and output formatting only.

use anyhow::{Context, Result};
use atlas_core::config::AtlasConfig;
use atlas_core::record::RegistrySource;
use atlas_loader::cypher::CypherHttpStore;
use atlas_pipeline::search::SearchRequest;
use atlas_pipeline::stats::GraphStats;
use atlas_pipeline::{Pipeline, RunOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mcp-atlas", about = "MCP registry knowledge graph builder")]
struct Cli {
    /// Data directory (defaults to ./data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, resolve, infer, load
    Run {
        /// Re-resolve even if nothing changed since the last run
        #[arg(long)]
        force_refresh: bool,

        /// Registries to ingest (repeatable; defaults to all)
        #[arg(long)]
        registry: Vec<RegistrySource>,

        /// Wipe the graph store's managed labels before loading
        #[arg(long)]
        clear: bool,

        /// Resolve and save the graph without loading the graph store
        #[arg(long)]
        skip_load: bool,
    },

    /// Search resolved entities by free-text prompt
    Search {
        /// Search prompt
        prompt: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum score a hit must reach
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,
    },

    /// Show statistics for the resolved graph
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("data"));
    let config = AtlasConfig::load(&data_dir).context("failed to load configuration")?;
    let pipeline = Pipeline::new(&data_dir, config);

    match cli.command {
        Commands::Run {
            force_refresh,
            registry,
            clear,
            skip_load,
        } => cmd_run(&pipeline, force_refresh, registry, clear, skip_load),
        Commands::Search {
            prompt,
            limit,
            min_confidence,
        } => cmd_search(&pipeline, &prompt, limit, min_confidence),
        Commands::Stats => cmd_stats(&pipeline),
    }
}

fn cmd_run(
    pipeline: &Pipeline,
    force_refresh: bool,
    registries: Vec<RegistrySource>,
    clear: bool,
    skip_load: bool,
) -> Result<()> {
    let options = RunOptions {
        force_refresh,
        registries,
        clear,
        skip_load,
    };
    let adapters = pipeline.default_adapters(&options);
    let store = CypherHttpStore::new(&pipeline.config().loader);

    let summary = pipeline.run(&options, adapters, &store)?;

    println!("Run summary");
    for (registry, ingest) in &summary.registries {
        match &ingest.error {
            Some(error) => println!("  {registry}: FAILED ({error})"),
            None => println!(
                "  {registry}: {} fetched, {} changed, {} unchanged, {} removed, {} invalid",
                ingest.fetched, ingest.changed, ingest.unchanged, ingest.removed, ingest.invalid
            ),
        }
    }
    println!(
        "  records: {} fetched, {} unchanged, {} rejected",
        summary.records_fetched, summary.records_unchanged, summary.records_rejected
    );
    println!(
        "  entities: {} resolved, {} stale, {} conflicts",
        summary.entities_resolved, summary.entities_stale, summary.merge_conflicts
    );
    println!("  edges: {}", summary.edges_created);
    if !skip_load {
        println!(
            "  load: {} batches committed, {} failed",
            summary.batches_committed, summary.batches_failed
        );
        if !summary.failed_entity_ids.is_empty() {
            println!("  failed entity ids: {}", summary.failed_entity_ids.join(", "));
        }
    }
    for conflict in &summary.conflicts {
        println!("  conflict: {conflict}");
    }
    for rejected in &summary.rejected {
        println!("  rejected: {rejected}");
    }
    Ok(())
}

fn cmd_search(
    pipeline: &Pipeline,
    prompt: &str,
    limit: usize,
    min_confidence: f64,
) -> Result<()> {
    let graph = pipeline.load_graph()?;
    let response = atlas_pipeline::search::search(
        &graph,
        &SearchRequest {
            prompt: prompt.to_string(),
            limit,
            min_confidence,
        },
    );

    println!(
        "{} matches ({} returned)",
        response.total_found,
        response.entities.len()
    );
    for hit in &response.entities {
        println!(
            "  {:.1}  {}  [{}]",
            hit.score,
            hit.global_id,
            hit.categories.join(", ")
        );
        if let Some(description) = &hit.description {
            println!("        {description}");
        }
    }
    Ok(())
}

fn cmd_stats(pipeline: &Pipeline) -> Result<()> {
    let graph = pipeline.load_graph()?;
    let stats = GraphStats::collect(&graph, 10);
    print!("{}", stats.render());
    Ok(())
}
