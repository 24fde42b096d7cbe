//! Shared error taxonomy for the pipeline.
//!
//! Every variant here is a *reportable* condition: rejected records and
//! conflicted matches flow into the run summary rather than being dropped.

use crate::record::RegistrySource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A registry could not be fetched. Per-registry and recoverable: one
/// registry failing never aborts the others.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("fetch from {registry} failed: {reason}")]
pub struct FetchError {
    pub registry: RegistrySource,
    pub reason: String,
}

impl FetchError {
    pub fn new(registry: RegistrySource, reason: impl Into<String>) -> Self {
        Self {
            registry,
            reason: reason.into(),
        }
    }
}

/// No identity tier produced a usable GlobalID for a record. The record is
/// rejected (logged with its source), the batch continues.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("cannot derive a global id for {registry}/{source_id} (name: {name:?})")]
pub struct UnidentifiableRecord {
    pub registry: RegistrySource,
    pub source_id: String,
    pub name: String,
}

/// A record's match rules pointed at two different canonical entities.
///
/// The record is attached to the higher-confidence match only; the conflict
/// is surfaced for manual review, never auto-resolved either way.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error(
    "record {registry}/{source_id} matched both {chosen} ({chosen_confidence}) \
     and {rejected} ({rejected_confidence}); attached to {chosen}"
)]
pub struct ConflictingMatch {
    pub registry: RegistrySource,
    pub source_id: String,
    /// GlobalID of the entity the record was attached to.
    pub chosen: String,
    pub chosen_confidence: f64,
    /// GlobalID of the entity the record also matched but was not merged into.
    pub rejected: String,
    pub rejected_confidence: f64,
}
