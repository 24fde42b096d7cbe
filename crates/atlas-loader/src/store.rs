//! The downstream interface: an opaque, upsert-keyed graph store.

use atlas_core::entity::{CanonicalEntity, RelationshipEdge};
use thiserror::Error;

/// Errors from a graph store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("store error ({code}): {message}")]
    Backend { code: String, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
}

/// An upsert target for canonical entities and relationship edges.
///
/// Implementations must be keyed by GlobalID with create-or-update
/// semantics; loading the same entity twice must never duplicate a node.
/// Per-batch atomicity is the store's responsibility; the loader never
/// spans a transaction across batches.
pub trait GraphStore: Send + Sync {
    /// Create uniqueness constraints and indexes, idempotently.
    fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Bulk create-or-update one batch of entities, keyed by GlobalID.
    /// Returns how many rows the store acknowledged.
    fn upsert_entities(&self, entities: &[CanonicalEntity]) -> Result<usize, StoreError>;

    /// Bulk create-or-update one batch of edges, keyed by endpoint pair and
    /// kind.
    fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<usize, StoreError>;

    /// Remove every node and edge under the managed label set.
    fn clear_managed(&self) -> Result<(), StoreError>;
}
