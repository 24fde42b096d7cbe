//! Master data: the persisted resolved graph.
//!
//! The latest resolution output lives at `<data_dir>/master/graph.json`.
//! When it is newer than every registry snapshot and nothing changed, the
//! pipeline reuses it instead of re-resolving.

use anyhow::{Context, Result};
use atlas_core::graph::KnowledgeGraph;
use atlas_snapshot::payload;
use std::path::{Path, PathBuf};

const MASTER_DIR: &str = "master";
const GRAPH_FILE: &str = "graph.json";

/// Path to the master graph file for a given data dir.
pub fn graph_file(data_dir: &Path) -> PathBuf {
    data_dir.join(MASTER_DIR).join(GRAPH_FILE)
}

/// Whether a resolved graph has been saved.
pub fn exists(data_dir: &Path) -> bool {
    graph_file(data_dir).exists()
}

/// Load the master graph and rebuild its in-memory indexes.
pub fn load(data_dir: &Path) -> Result<KnowledgeGraph> {
    let path = graph_file(data_dir);
    let mut graph: KnowledgeGraph = payload::read_json(&path)
        .with_context(|| format!("failed to load master graph from {}", path.display()))?;
    graph.rebuild_adjacency();
    Ok(graph)
}

/// Save the master graph, creating the master directory if needed.
pub fn save(data_dir: &Path, graph: &KnowledgeGraph, compress: bool) -> Result<()> {
    let dir = data_dir.join(MASTER_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create master directory {}", dir.display()))?;

    let path = dir.join(GRAPH_FILE);
    let bytes = serde_json::to_vec_pretty(graph)?;
    payload::write_atomic(&path, &bytes, compress)
        .with_context(|| format!("failed to write master graph to {}", path.display()))?;
    Ok(())
}
