use atlas_core::config::LoaderConfig;
use atlas_core::entity::{CanonicalEntity, Provenance, RelationKind, RelationshipEdge};
use atlas_core::record::RegistrySource;
use atlas_loader::loader::entity_checksum;
use atlas_loader::memory::MemoryStore;
use atlas_loader::{GraphLoader, LoadLedger, LoadMode};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn make_entity(global_id: &str) -> CanonicalEntity {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
    CanonicalEntity {
        global_id: global_id.to_string(),
        name: global_id.to_string(),
        description: None,
        author: None,
        repository_url: None,
        categories: Vec::new(),
        operations: Vec::new(),
        tools: Vec::new(),
        popularity_score: None,
        download_count: None,
        language: None,
        version: None,
        license: None,
        homepage: None,
        first_seen: at,
        last_seen: at,
        stale: false,
        provenance: vec![Provenance {
            registry: RegistrySource::Github,
            source_id: global_id.to_string(),
            checksum: format!("ck-{global_id}"),
        }],
    }
}

fn make_entities(n: usize) -> Vec<CanonicalEntity> {
    (0..n).map(|i| make_entity(&format!("srv/{i:04}"))).collect()
}

fn config() -> LoaderConfig {
    LoaderConfig {
        batch_size: 500,
        max_retries: 2,
        retry_backoff_ms: 1,
        concurrency: 2,
        ..LoaderConfig::default()
    }
}

#[test]
fn test_thousand_entities_load_in_two_batches() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    let entities = make_entities(1000);

    let loader = GraphLoader::new(&store, config());
    let summary = loader
        .load(&entities, &[], LoadMode::Clear, &mut ledger)
        .unwrap();

    assert_eq!(store.upsert_calls(), 2);
    assert_eq!(summary.batches_committed, 2);
    assert_eq!(summary.batches_failed, 0);
    assert_eq!(summary.entities_sent, 1000);
    assert_eq!(store.entity_count(), 1000);
}

#[test]
fn test_double_load_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    let entities = make_entities(10);
    let edges = vec![RelationshipEdge::new(
        "srv/0000",
        "srv/0001",
        RelationKind::SameAuthor,
        "test",
    )];

    let loader = GraphLoader::new(&store, config());
    loader
        .load(&entities, &edges, LoadMode::Clear, &mut ledger)
        .unwrap();
    let first_entities = store.entity_count();
    let first_edges = store.edge_count();

    loader
        .load(&entities, &edges, LoadMode::Clear, &mut ledger)
        .unwrap();

    // Upsert semantics: same node/edge count as loading once
    assert_eq!(store.entity_count(), first_entities);
    assert_eq!(store.edge_count(), first_edges);
}

#[test]
fn test_failed_batch_retries_then_succeeds() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    let entities = make_entities(10);

    store.fail_next(1);
    let loader = GraphLoader::new(&store, config());
    let summary = loader
        .load(&entities, &[], LoadMode::Clear, &mut ledger)
        .unwrap();

    assert_eq!(summary.batches_committed, 1);
    assert_eq!(summary.batches_failed, 0);
    // One failed attempt plus the successful retry
    assert_eq!(store.upsert_calls(), 2);
    assert_eq!(store.entity_count(), 10);
}

#[test]
fn test_exhausted_retries_report_failed_entity_ids() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    // Two entity batches; the first exhausts its retries, the second commits.
    let entities = make_entities(600);

    let loader = GraphLoader::new(
        &store,
        LoaderConfig {
            concurrency: 1,
            ..config()
        },
    );
    // max_retries = 2 → 3 attempts for the first batch, all failing
    store.fail_next(3);
    let summary = loader
        .load(&entities, &[], LoadMode::Clear, &mut ledger)
        .unwrap();

    assert_eq!(summary.batches_committed, 1);
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.failed_entity_ids.len(), 500);
    assert!(summary.failed_entity_ids.contains(&"srv/0000".to_string()));
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].attempts, 3);

    // The committed batch was not rolled back by the earlier failure
    assert_eq!(store.entity_count(), 100);
}

#[test]
fn test_incremental_load_skips_unchanged_entities() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    let mut entities = make_entities(10);

    let loader = GraphLoader::new(&store, config());
    let first = loader
        .load(&entities, &[], LoadMode::Incremental, &mut ledger)
        .unwrap();
    assert_eq!(first.entities_sent, 10);
    assert_eq!(first.entities_skipped_unchanged, 0);

    // Nothing changed: the second incremental load sends nothing
    let second = loader
        .load(&entities, &[], LoadMode::Incremental, &mut ledger)
        .unwrap();
    assert_eq!(second.entities_sent, 0);
    assert_eq!(second.entities_skipped_unchanged, 10);

    // One entity's snapshot checksum moves: exactly one gets re-sent
    entities[3].provenance[0].checksum = "ck-updated".to_string();
    let third = loader
        .load(&entities, &[], LoadMode::Incremental, &mut ledger)
        .unwrap();
    assert_eq!(third.entities_sent, 1);
    assert_eq!(third.entities_skipped_unchanged, 9);
}

#[test]
fn test_ledger_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let entities = make_entities(5);

    {
        let mut ledger = LoadLedger::open(tmp.path()).unwrap();
        let loader = GraphLoader::new(&store, config());
        loader
            .load(&entities, &[], LoadMode::Incremental, &mut ledger)
            .unwrap();
    }

    // A fresh process sees the committed state and skips everything
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();
    let loader = GraphLoader::new(&store, config());
    let summary = loader
        .load(&entities, &[], LoadMode::Incremental, &mut ledger)
        .unwrap();
    assert_eq!(summary.entities_sent, 0);
    assert_eq!(summary.entities_skipped_unchanged, 5);
}

#[test]
fn test_clear_mode_resets_ledger_and_store() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut ledger = LoadLedger::open(tmp.path()).unwrap();

    let loader = GraphLoader::new(&store, config());
    loader
        .load(&make_entities(5), &[], LoadMode::Clear, &mut ledger)
        .unwrap();

    // Clear-and-reload with a smaller set: stale nodes are gone
    let summary = loader
        .load(&make_entities(2), &[], LoadMode::Clear, &mut ledger)
        .unwrap();
    assert_eq!(summary.entities_sent, 2);
    assert_eq!(store.entity_count(), 2);
}

#[test]
fn test_entity_checksum_tracks_provenance() {
    let a = make_entity("srv/a");
    let mut b = make_entity("srv/a");
    assert_eq!(entity_checksum(&a), entity_checksum(&b));

    b.provenance.push(Provenance {
        registry: RegistrySource::Glama,
        source_id: "other".to_string(),
        checksum: "ck-other".to_string(),
    });
    assert_ne!(entity_checksum(&a), entity_checksum(&b));
}
