//! Entity resolution for the MCP registry knowledge graph.
//!
//! Three stages, in data-flow order: [`identity`] derives a deterministic
//! GlobalID per raw record, [`resolver`] matches and merges records into
//! canonical entities, and [`infer`] computes confidence-scored relationship
//! edges between the merged entities.

pub mod identity;
pub mod infer;
pub mod resolver;
pub mod similarity;

pub use identity::{GlobalId, IdTier, derive_global_id};
pub use infer::RelationshipInferencer;
pub use resolver::{EntityResolver, IdentifiedRecord, Resolution};
