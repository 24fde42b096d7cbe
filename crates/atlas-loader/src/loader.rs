//! Batched, idempotent loading with retry and backoff.

use crate::ledger::LoadLedger;
use crate::store::{GraphStore, StoreError};
use atlas_core::config::LoaderConfig;
use atlas_core::entity::{CanonicalEntity, RelationshipEdge};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// How a load treats existing store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Wipe the managed label set, then load everything.
    Clear,
    /// Load only entities whose snapshot checksum changed since the last
    /// committed load.
    Incremental,
}

/// A batch that exhausted its retries. Committed batches are never rolled
/// back by a later failure; the listed IDs are exactly what needs a re-run.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("batch {batch_index} failed after {attempts} attempts: {message}")]
pub struct LoadBatchError {
    pub batch_index: usize,
    pub attempts: usize,
    pub message: String,
    /// GlobalIDs (entity batches) or endpoint pairs (edge batches).
    pub entity_ids: Vec<String>,
}

/// Per-load accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub entities_sent: usize,
    pub entities_skipped_unchanged: usize,
    pub edges_sent: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_entity_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LoadBatchError>,
}

/// Partitions entities and edges into batches and upserts each batch as an
/// independent unit against the store.
pub struct GraphLoader<'a> {
    store: &'a dyn GraphStore,
    config: LoaderConfig,
}

impl<'a> GraphLoader<'a> {
    pub fn new(store: &'a dyn GraphStore, config: LoaderConfig) -> Self {
        Self { store, config }
    }

    /// Load entities and edges. Each batch retries with exponential backoff
    /// up to `max_retries`, then is recorded as failed; at most
    /// `concurrency` batches are in flight at once.
    pub fn load(
        &self,
        entities: &[CanonicalEntity],
        edges: &[RelationshipEdge],
        mode: LoadMode,
        ledger: &mut LoadLedger,
    ) -> Result<LoadSummary, StoreError> {
        let mut summary = LoadSummary::default();

        self.store.ensure_schema()?;

        if mode == LoadMode::Clear {
            self.store.clear_managed()?;
            ledger.clear();
        }

        // Incremental mode sends only entities whose snapshot checksum moved
        // since the last committed load. Edges are always re-sent in full:
        // the edge set is recomputed per pass and upserts are idempotent.
        let to_send: Vec<&CanonicalEntity> = match mode {
            LoadMode::Clear => entities.iter().collect(),
            LoadMode::Incremental => entities
                .iter()
                .filter(|e| ledger.is_changed(&e.global_id, &entity_checksum(e)))
                .collect(),
        };
        summary.entities_skipped_unchanged = entities.len() - to_send.len();

        let entity_batches: Vec<&[&CanonicalEntity]> =
            to_send.chunks(self.config.batch_size).collect();
        let outcomes = self.run_batches(&entity_batches, |batch| {
            let owned: Vec<CanonicalEntity> = batch.iter().map(|e| (*e).clone()).collect();
            self.store.upsert_entities(&owned)
        });

        for (batch, outcome) in entity_batches.iter().zip(outcomes) {
            match outcome {
                Ok(sent) => {
                    summary.batches_committed += 1;
                    summary.entities_sent += sent;
                    for entity in *batch {
                        ledger.record(&entity.global_id, &entity_checksum(entity));
                    }
                }
                Err(err) => {
                    summary.batches_failed += 1;
                    summary.failed_entity_ids.extend(err.entity_ids.clone());
                    summary.errors.push(err);
                }
            }
        }

        let edge_batches: Vec<&[RelationshipEdge]> =
            edges.chunks(self.config.batch_size).collect();
        let outcomes = self.run_batches(&edge_batches, |batch| self.store.upsert_edges(batch));

        for outcome in outcomes {
            match outcome {
                Ok(sent) => {
                    summary.batches_committed += 1;
                    summary.edges_sent += sent;
                }
                Err(err) => {
                    summary.batches_failed += 1;
                    summary.errors.push(err);
                }
            }
        }

        ledger.save().map_err(|e| StoreError::Backend {
            code: "ledger".to_string(),
            message: e.to_string(),
        })?;

        tracing::info!(
            entities = summary.entities_sent,
            skipped = summary.entities_skipped_unchanged,
            edges = summary.edges_sent,
            committed = summary.batches_committed,
            failed = summary.batches_failed,
            "graph load complete"
        );

        Ok(summary)
    }

    /// Run batches in bounded-concurrency waves. Each batch is independent:
    /// one failing never rolls back or blocks the others.
    fn run_batches<B, F>(&self, batches: &[B], commit: F) -> Vec<Result<usize, LoadBatchError>>
    where
        B: BatchIds + Sync,
        F: Fn(&B) -> Result<usize, StoreError> + Sync,
    {
        let mut outcomes = Vec::with_capacity(batches.len());
        let concurrency = self.config.concurrency.max(1);

        for (wave_index, wave) in batches.chunks(concurrency).enumerate() {
            let wave_base = wave_index * concurrency;
            std::thread::scope(|scope| {
                let handles: Vec<_> = wave
                    .iter()
                    .enumerate()
                    .map(|(offset, batch)| {
                        let commit = &commit;
                        scope.spawn(move || {
                            self.commit_with_retry(wave_base + offset, batch, commit)
                        })
                    })
                    .collect();
                for handle in handles {
                    outcomes.push(handle.join().expect("batch worker panicked"));
                }
            });
        }
        outcomes
    }

    fn commit_with_retry<B, F>(
        &self,
        batch_index: usize,
        batch: &B,
        commit: &F,
    ) -> Result<usize, LoadBatchError>
    where
        B: BatchIds,
        F: Fn(&B) -> Result<usize, StoreError>,
    {
        let mut attempt = 0;
        loop {
            match commit(batch) {
                Ok(sent) => return Ok(sent),
                Err(err) if attempt < self.config.max_retries => {
                    let backoff = self.config.retry_backoff_ms.saturating_mul(1 << attempt);
                    tracing::warn!(
                        batch_index,
                        attempt = attempt + 1,
                        %err,
                        backoff_ms = backoff,
                        "batch upsert failed, retrying"
                    );
                    std::thread::sleep(std::time::Duration::from_millis(backoff));
                    attempt += 1;
                }
                Err(err) => {
                    return Err(LoadBatchError {
                        batch_index,
                        attempts: attempt + 1,
                        message: err.to_string(),
                        entity_ids: batch.ids(),
                    });
                }
            }
        }
    }
}

/// Checksum tying an entity to the snapshot state it was merged from:
/// a digest over its sorted provenance checksums.
pub fn entity_checksum(entity: &CanonicalEntity) -> String {
    let mut checksums: Vec<&str> = entity
        .provenance
        .iter()
        .map(|p| p.checksum.as_str())
        .collect();
    checksums.sort_unstable();

    let mut hasher = Sha256::new();
    for c in checksums {
        hasher.update(c.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(hasher.finalize())[..16].to_string()
}

/// The IDs a failed batch reports for targeted re-runs.
trait BatchIds {
    fn ids(&self) -> Vec<String>;
}

impl BatchIds for &[&CanonicalEntity] {
    fn ids(&self) -> Vec<String> {
        self.iter().map(|e| e.global_id.clone()).collect()
    }
}

impl BatchIds for &[RelationshipEdge] {
    fn ids(&self) -> Vec<String> {
        self.iter()
            .map(|e| format!("{}~{}", e.entity_a, e.entity_b))
            .collect()
    }
}
