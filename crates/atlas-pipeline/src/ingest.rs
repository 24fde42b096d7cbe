//! Concurrent registry ingestion.
//!
//! One worker thread per registry: sources are independent and I/O-bound, so
//! a timeout or failure on one is isolated and never blocks the others.
//! Workers capture into the snapshot store and emit their results over a
//! channel; the consuming side collects until every registry reports or the
//! deadline passes. That wait is the barrier entity resolution needs before
//! it can see the full cross-registry candidate set.

use atlas_core::adapter::{FetchBatch, RegistryAdapter};
use atlas_core::error::FetchError;
use atlas_core::record::{
    OperationType, RawRecord, RegistrySource, ServerCategory, ToolSpec,
};
use atlas_core::summary::RegistryIngest;
use atlas_snapshot::{Capture, SnapshotStore};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Everything ingestion produced for one run.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Successful captures, one per registry that completed in time.
    pub captures: Vec<Capture>,
    /// Per-registry accounting, including failures.
    pub reports: BTreeMap<String, RegistryIngest>,
}

impl IngestOutcome {
    /// Changes that require a resolution pass: modified, new, or vanished
    /// records anywhere.
    pub fn total_changed(&self) -> usize {
        self.reports.values().map(|r| r.changed + r.removed).sum()
    }
}

enum WorkerReport {
    Captured {
        registry: RegistrySource,
        capture: Capture,
        invalid: usize,
    },
    Failed(FetchError),
}

/// Fetch every adapter concurrently, capture into the snapshot store, and
/// wait for all registries (or the per-run deadline) before returning.
pub fn ingest_registries(
    adapters: Vec<Box<dyn RegistryAdapter>>,
    store: &SnapshotStore,
    timeout: Duration,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();
    if adapters.is_empty() {
        return outcome;
    }

    let expected = adapters.len();
    let (tx, rx) = mpsc::channel::<WorkerReport>();

    // Workers need 'static data: move the adapter in, clone the store's
    // location. Handles are deliberately detached: a worker that outlives
    // the deadline finishes its snapshot in the background, and that
    // snapshot is still valid for the next run.
    for adapter in adapters {
        let tx = tx.clone();
        let store = store.clone();
        std::thread::spawn(move || {
            let registry = adapter.registry();
            let report = match adapter.fetch() {
                Ok(FetchBatch { records, invalid }) => match store.capture(registry, records) {
                    Ok(capture) => WorkerReport::Captured {
                        registry,
                        capture,
                        invalid,
                    },
                    Err(err) => WorkerReport::Failed(FetchError::new(
                        registry,
                        format!("snapshot capture failed: {err}"),
                    )),
                },
                Err(err) => WorkerReport::Failed(err),
            };
            // The receiver may have given up on us; that is not an error.
            let _ = tx.send(report);
        });
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    let mut received = 0;
    while received < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(WorkerReport::Captured {
                registry,
                capture,
                invalid,
            }) => {
                received += 1;
                outcome.reports.insert(
                    registry.to_string(),
                    RegistryIngest {
                        fetched: capture.manifest.item_count,
                        changed: capture.changed,
                        unchanged: capture.unchanged,
                        removed: capture.removed,
                        invalid,
                        error: None,
                    },
                );
                outcome.captures.push(capture);
            }
            Ok(WorkerReport::Failed(err)) => {
                received += 1;
                tracing::warn!(%err, "registry ingestion failed");
                outcome.reports.insert(
                    err.registry.to_string(),
                    RegistryIngest {
                        error: Some(err.reason.clone()),
                        ..RegistryIngest::default()
                    },
                );
            }
            Err(_) => {
                // Deadline passed with workers still running. Record the
                // stragglers as timed out and stop waiting; their threads are
                // detached and may still complete their snapshots.
                tracing::warn!(
                    missing = expected - received,
                    "ingestion deadline passed with registries outstanding"
                );
                break;
            }
        }
    }

    outcome
}

/// Reference adapter: reads the newest scraped JSON dump for one registry
/// from `<data_dir>/scraped/<registry>/*.json`.
///
/// Dumps are either a bare array of items or `{"servers": [...]}`. Items are
/// loosely typed; this adapter is the boundary where each registry's shape
/// becomes a strongly-typed [`RawRecord`]; items without a usable name are
/// skipped and counted, never silently dropped from the accounting.
pub struct JsonDumpAdapter {
    registry: RegistrySource,
    dir: PathBuf,
}

impl JsonDumpAdapter {
    pub fn new(data_dir: &Path, registry: RegistrySource) -> Self {
        Self {
            registry,
            dir: data_dir.join("scraped").join(registry.dir_name()),
        }
    }

    fn newest_dump(&self) -> Result<PathBuf, FetchError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            FetchError::new(
                self.registry,
                format!("cannot list {}: {e}", self.dir.display()),
            )
        })?;

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }

        newest.map(|(_, p)| p).ok_or_else(|| {
            FetchError::new(
                self.registry,
                format!("no dump files in {}", self.dir.display()),
            )
        })
    }

    fn convert_item(&self, item: &Value) -> Option<RawRecord> {
        let name = item.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }

        let source_id = string_field(item, &["id", "slug", "source_id"])
            .unwrap_or_else(|| name.to_string());

        let mut record = RawRecord::new(self.registry, source_id, name);
        record.fetched_at = Utc::now();
        record.description = string_field(item, &["description", "summary"]);
        record.author = string_field(item, &["author", "owner", "publisher"]);
        record.repository_url = string_field(item, &["repository", "repository_url", "repo"]);
        record.homepage = string_field(item, &["homepage", "url", "website"]);
        record.language = string_field(item, &["implementation_language", "language"]);
        record.version = string_field(item, &["version"]);
        record.license = string_field(item, &["license"]);
        record.popularity_score = number_field(item, &["popularity_score", "stars", "score"]);
        record.download_count = number_field(item, &["download_count", "downloads"]);

        if let Some(categories) = item.get("categories").and_then(Value::as_array) {
            record.categories = categories
                .iter()
                .filter_map(Value::as_str)
                .map(parse_category)
                .collect();
            record.categories.sort_unstable();
            record.categories.dedup();
        }
        if let Some(operations) = item.get("operations").and_then(Value::as_array) {
            record.operations = operations
                .iter()
                .filter_map(Value::as_str)
                .filter_map(parse_operation)
                .collect();
            record.operations.sort_unstable();
            record.operations.dedup();
        }
        if let Some(tools) = item.get("tools").and_then(Value::as_array) {
            record.tools = tools
                .iter()
                .filter_map(|t| match t {
                    Value::String(name) => Some(ToolSpec {
                        name: name.clone(),
                        description: None,
                    }),
                    Value::Object(_) => t.get("name").and_then(Value::as_str).map(|name| {
                        ToolSpec {
                            name: name.to_string(),
                            description: string_field(t, &["description"]),
                        }
                    }),
                    _ => None,
                })
                .collect();
        }

        Some(record)
    }
}

impl RegistryAdapter for JsonDumpAdapter {
    fn registry(&self) -> RegistrySource {
        self.registry
    }

    fn fetch(&self) -> Result<FetchBatch, FetchError> {
        let path = self.newest_dump()?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FetchError::new(self.registry, format!("cannot read {}: {e}", path.display()))
        })?;
        let json: Value = serde_json::from_str(&content).map_err(|e| {
            FetchError::new(self.registry, format!("invalid JSON in {}: {e}", path.display()))
        })?;

        let items = match &json {
            Value::Array(items) => items.as_slice(),
            Value::Object(_) => json
                .get("servers")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        };

        let mut batch = FetchBatch::default();
        for item in items {
            match self.convert_item(item) {
                Some(record) => batch.records.push(record),
                None => batch.invalid += 1,
            }
        }

        tracing::debug!(
            registry = %self.registry,
            records = batch.records.len(),
            invalid = batch.invalid,
            dump = %path.display(),
            "parsed registry dump"
        );
        Ok(batch)
    }
}

fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_field(item: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|k| item.get(k)).find_map(Value::as_u64)
}

/// Registries are untrusted: unknown categories degrade to `Other` instead
/// of failing the item.
fn parse_category(s: &str) -> ServerCategory {
    match s.trim().to_lowercase().as_str() {
        "database" | "databases" => ServerCategory::Database,
        "file_system" | "filesystem" | "files" => ServerCategory::FileSystem,
        "api_integration" | "api" => ServerCategory::ApiIntegration,
        "development_tools" | "dev_tools" | "development" => ServerCategory::DevelopmentTools,
        "data_processing" | "data" => ServerCategory::DataProcessing,
        "cloud_services" | "cloud" => ServerCategory::CloudServices,
        "communication" | "messaging" => ServerCategory::Communication,
        "authentication" | "auth" | "security" => ServerCategory::Authentication,
        "monitoring" | "observability" => ServerCategory::Monitoring,
        "search" => ServerCategory::Search,
        "ai_ml" | "ai" | "ml" | "llm" => ServerCategory::AiMl,
        _ => ServerCategory::Other,
    }
}

fn parse_operation(s: &str) -> Option<OperationType> {
    match s.trim().to_lowercase().as_str() {
        "read" => Some(OperationType::Read),
        "write" => Some(OperationType::Write),
        "query" => Some(OperationType::Query),
        "execute" => Some(OperationType::Execute),
        "transform" => Some(OperationType::Transform),
        "analyze" => Some(OperationType::Analyze),
        "sync" => Some(OperationType::Sync),
        "stream" => Some(OperationType::Stream),
        _ => None,
    }
}
