//! Graph-store loading for the resolved knowledge graph.
//!
//! The [`store::GraphStore`] trait treats the store as an opaque upsert
//! target; [`cypher::CypherHttpStore`] speaks Neo4j's transactional HTTP
//! endpoint and [`memory::MemoryStore`] backs tests. [`loader::GraphLoader`]
//! partitions work into retried, idempotent batches and tracks committed
//! checksums in a [`ledger::LoadLedger`] for incremental runs.

pub mod cypher;
pub mod ledger;
pub mod loader;
pub mod memory;
pub mod store;

pub use ledger::LoadLedger;
pub use loader::{GraphLoader, LoadBatchError, LoadMode, LoadSummary};
pub use store::{GraphStore, StoreError};
