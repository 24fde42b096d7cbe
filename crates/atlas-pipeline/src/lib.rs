//! Pipeline orchestration for the MCP registry knowledge graph.
//!
//! Ties the stages together: concurrent per-registry ingestion into the
//! snapshot store, the single-writer resolution barrier, relationship
//! inference, batched graph loading, and the thin consumers (search, stats)
//! that read the resolved graph. Every entry point is callable from any thin
//! CLI; no argument parsing lives here.

pub mod ingest;
pub mod master;
pub mod progress;
pub mod run;
pub mod search;
pub mod stats;

pub use run::{Pipeline, RunOptions};
pub use search::{SearchRequest, SearchResponse};
