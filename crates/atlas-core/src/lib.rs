//! Core types for the MCP registry knowledge graph.
//!
//! Provides the raw-record and canonical-entity data model
//! ([`record::RawRecord`], [`entity::CanonicalEntity`]), the in-memory graph
//! container ([`graph::KnowledgeGraph`]), the registry-adapter interface,
//! configuration loading, and the shared error taxonomy.

pub mod adapter;
pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod record;
pub mod summary;
