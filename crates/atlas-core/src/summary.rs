//! Per-stage run accounting.
//!
//! The pipeline never reports a single success/failure boolean; partial
//! success is the normal case, so every stage contributes counts and every
//! rejected or conflicted record appears here.

use crate::error::{ConflictingMatch, UnidentifiableRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ingestion outcome for one registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryIngest {
    pub fetched: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Records the previous snapshot had that this run did not.
    pub removed: usize,
    /// Payload items the adapter could not convert into a RawRecord.
    pub invalid: usize,
    /// Set when the registry failed outright; the others still ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated counts for one full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub registries: BTreeMap<String, RegistryIngest>,
    pub records_fetched: usize,
    pub records_unchanged: usize,
    pub records_rejected: usize,
    pub entities_resolved: usize,
    pub entities_stale: usize,
    pub merge_conflicts: usize,
    pub edges_created: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    /// GlobalIDs from batches that exhausted retries, for targeted re-runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_entity_ids: Vec<String>,
    /// Full diagnostics for rejected records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<UnidentifiableRecord>,
    /// Full diagnostics for ambiguous matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictingMatch>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            registries: BTreeMap::new(),
            records_fetched: 0,
            records_unchanged: 0,
            records_rejected: 0,
            entities_resolved: 0,
            entities_stale: 0,
            merge_conflicts: 0,
            edges_created: 0,
            batches_committed: 0,
            batches_failed: 0,
            failed_entity_ids: Vec::new(),
            rejected: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Record one registry's ingestion outcome and roll it into the totals.
    pub fn record_ingest(&mut self, registry: &str, ingest: RegistryIngest) {
        self.records_fetched += ingest.fetched;
        self.records_unchanged += ingest.unchanged;
        self.registries.insert(registry.to_string(), ingest);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
