//! The pipeline entry points.
//!
//! Callable from any thin CLI: run-all, force-refresh, registry subset
//! selection, clear-and-reload, and stats-only all route through
//! [`Pipeline`].

use crate::ingest::{self, JsonDumpAdapter};
use crate::master;
use crate::progress::PipelineProgress;
use anyhow::{Context, Result};
use atlas_core::adapter::RegistryAdapter;
use atlas_core::config::AtlasConfig;
use atlas_core::graph::KnowledgeGraph;
use atlas_core::record::{RawRecord, RegistrySource};
use atlas_core::summary::RunSummary;
use atlas_loader::{GraphLoader, GraphStore, LoadLedger, LoadMode};
use atlas_resolve::resolver::identify_records;
use atlas_resolve::{EntityResolver, RelationshipInferencer};
use atlas_snapshot::SnapshotStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What one pipeline run should do.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-resolve even when the master graph is current and nothing changed.
    pub force_refresh: bool,
    /// Registries to ingest this run; empty means all. Resolution always
    /// sees the latest snapshot of *every* registry, because cross-registry
    /// matching needs the full candidate set.
    pub registries: Vec<RegistrySource>,
    /// Wipe the managed label set before loading.
    pub clear: bool,
    /// Resolve and save the graph without touching the graph store.
    pub skip_load: bool,
}

/// Orchestrates the full flow against one data directory.
pub struct Pipeline {
    data_dir: PathBuf,
    config: AtlasConfig,
}

impl Pipeline {
    pub fn new(data_dir: impl Into<PathBuf>, config: AtlasConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Default adapters for the selected registries: one JSON-dump reader
    /// per registry, honoring the config's registry subset.
    pub fn default_adapters(&self, options: &RunOptions) -> Vec<Box<dyn RegistryAdapter>> {
        let selected: Vec<RegistrySource> = if !options.registries.is_empty() {
            options.registries.clone()
        } else if !self.config.ingest.registries.is_empty() {
            self.config
                .ingest
                .registries
                .iter()
                .filter_map(|name| name.parse().ok())
                .collect()
        } else {
            RegistrySource::ALL.to_vec()
        };

        selected
            .into_iter()
            .map(|registry| {
                Box::new(JsonDumpAdapter::new(&self.data_dir, registry))
                    as Box<dyn RegistryAdapter>
            })
            .collect()
    }

    /// Run the full pipeline: ingest → resolve → infer → load.
    ///
    /// Always returns per-stage counts; partial success (some registries
    /// failed, some batches failed) is the normal case, not an exception.
    pub fn run(
        &self,
        options: &RunOptions,
        adapters: Vec<Box<dyn RegistryAdapter>>,
        store: &dyn GraphStore,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let progress = PipelineProgress::new();
        let snapshots = SnapshotStore::new(&self.data_dir, &self.config.storage);

        // Capture time of the newest pre-existing snapshot. A current master
        // must postdate it; otherwise an earlier run crashed between
        // capturing and saving, and the master is stale despite zero changes.
        let previous_capture = snapshots.newest_capture_time()?;

        // Phase 1: concurrent ingestion, one worker per registry.
        progress.start_phase("Ingest", adapters.len() as u64);
        let timeout = Duration::from_secs(self.config.ingest.fetch_timeout_secs);
        let outcome = ingest::ingest_registries(adapters, &snapshots, timeout);
        for (registry, report) in &outcome.reports {
            summary.record_ingest(registry, report.clone());
            progress.tick_phase();
        }

        // Reuse the saved graph when nothing changed and a refresh was not
        // forced; change detection is what makes re-runs cheap.
        let mut graph = None;
        if !options.force_refresh
            && outcome.total_changed() == 0
            && master::exists(&self.data_dir)
        {
            let saved = master::load(&self.data_dir)?;
            if previous_capture.is_none_or(|t| saved.updated_at >= t) {
                progress.suspend(|| {
                    tracing::info!("no registry changes detected, reusing master graph");
                });
                graph = Some(saved);
            }
        }
        let graph = match graph {
            Some(graph) => graph,
            None => self.resolve_and_infer(&snapshots, &mut summary, &progress)?,
        };

        summary.entities_resolved = graph.entities.values().filter(|e| !e.stale).count();
        summary.entities_stale = graph.metadata.stale_entities;
        summary.edges_created = graph.edges.len();

        // Phase 4: batched load into the graph store.
        if !options.skip_load {
            let entities: Vec<_> = graph.entities.values().cloned().collect();
            let batches = entities.len().div_ceil(self.config.loader.batch_size)
                + graph.edges.len().div_ceil(self.config.loader.batch_size);
            progress.start_phase("Load", batches as u64);

            let mode = if options.clear {
                LoadMode::Clear
            } else {
                LoadMode::Incremental
            };
            let mut ledger = LoadLedger::open(&self.data_dir)?;
            let loader = GraphLoader::new(store, self.config.loader.clone());
            let load = loader
                .load(&entities, &graph.edges, mode, &mut ledger)
                .context("graph load failed")?;

            summary.batches_committed = load.batches_committed;
            summary.batches_failed = load.batches_failed;
            summary.failed_entity_ids = load.failed_entity_ids;
        }

        progress.finish();
        summary.finish();
        Ok(summary)
    }

    /// Phases 2 and 3: the resolution barrier has passed. Fold the full
    /// candidate set into canonical entities, then infer edges.
    fn resolve_and_infer(
        &self,
        snapshots: &SnapshotStore,
        summary: &mut RunSummary,
        progress: &PipelineProgress,
    ) -> Result<KnowledgeGraph> {
        // The candidate set is the latest complete snapshot of every
        // registry, not just the ones ingested this run.
        let mut records: Vec<RawRecord> = Vec::new();
        for snapshot in snapshots.load_all_latest()? {
            records.extend(snapshot.records);
        }

        progress.start_phase("Resolve", records.len() as u64);

        let (identified, rejected) = identify_records(records);
        summary.records_rejected = rejected.len();
        summary.rejected = rejected;

        // Single writer: the resolver owns the canonical map; nothing else
        // mutates it during the run.
        let resolver = EntityResolver::new(self.config.resolution.clone());
        let resolution = resolver.resolve(identified);
        summary.merge_conflicts = resolution.conflicts.len();
        summary.conflicts = resolution.conflicts;

        // Entities present before but absent from this run go stale; they
        // are never silently deleted.
        let mut graph = if master::exists(&self.data_dir) {
            master::load(&self.data_dir)?
        } else {
            KnowledgeGraph::new()
        };
        let seen: HashSet<String> = resolution
            .entities
            .iter()
            .map(|e| e.global_id.clone())
            .collect();
        graph.mark_stale_absent(&seen);
        for entity in resolution.entities {
            graph.insert_entity(entity);
        }

        progress.start_phase("Infer", 1);
        let fresh: Vec<_> = graph
            .entities
            .values()
            .filter(|e| !e.stale)
            .cloned()
            .collect();
        let inferencer = RelationshipInferencer::new(self.config.inference.clone());
        let edges = inferencer.infer(&fresh);
        progress.tick_phase();

        graph.replace_edges(edges);
        graph.refresh_metadata();

        master::save(&self.data_dir, &graph, self.config.storage.compress)?;

        // Keep the snapshot history bounded.
        let pruned = snapshots.prune(self.config.storage.keep_snapshots)?;
        if pruned > 0 {
            tracing::debug!(pruned, "pruned old snapshots");
        }

        Ok(graph)
    }

    /// Stats-only entry point: load the saved graph without scraping or
    /// loading anything.
    pub fn load_graph(&self) -> Result<KnowledgeGraph> {
        master::load(&self.data_dir).context(
            "no master graph found; run the pipeline before asking for stats or search",
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
