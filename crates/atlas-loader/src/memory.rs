//! In-memory graph store for tests and dry runs.

use crate::store::{GraphStore, StoreError};
use atlas_core::entity::{CanonicalEntity, RelationshipEdge};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upsert target backed by maps, with the same keyed create-or-update
/// semantics as a real store. Can inject a fixed number of failures to
/// exercise the loader's retry path.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    /// Upsert calls that should fail before the store starts succeeding.
    fail_remaining: AtomicUsize,
    /// Total upsert calls issued (including failed ones).
    upsert_calls: AtomicUsize,
}

#[derive(Default)]
struct MemoryInner {
    entities: BTreeMap<String, CanonicalEntity>,
    edges: BTreeMap<(String, String, String), RelationshipEdge>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` upsert calls fail with a backend error.
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").edges.len()
    }

    pub fn get_entity(&self, global_id: &str) -> Option<CanonicalEntity> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .entities
            .get(global_id)
            .cloned()
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Backend {
                code: "injected".to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn upsert_entities(&self, entities: &[CanonicalEntity]) -> Result<usize, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        for entity in entities {
            inner
                .entities
                .insert(entity.global_id.clone(), entity.clone());
        }
        Ok(entities.len())
    }

    fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<usize, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        for edge in edges {
            let key = (
                edge.entity_a.clone(),
                edge.entity_b.clone(),
                edge.kind.as_str().to_string(),
            );
            inner.edges.insert(key, edge.clone());
        }
        Ok(edges.len())
    }

    fn clear_managed(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.entities.clear();
        inner.edges.clear();
        Ok(())
    }
}
