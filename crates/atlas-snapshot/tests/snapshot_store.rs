use atlas_core::config::StorageConfig;
use atlas_core::record::{RawRecord, RegistrySource};
use atlas_snapshot::SnapshotStore;
use tempfile::TempDir;

fn make_record(source_id: &str, name: &str, description: &str) -> RawRecord {
    let mut record = RawRecord::new(RegistrySource::Github, source_id, name);
    record.description = Some(description.to_string());
    record
}

fn store(tmp: &TempDir) -> SnapshotStore {
    SnapshotStore::new(tmp.path(), &StorageConfig::default())
}

#[test]
fn test_first_capture_marks_everything_changed() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let records = vec![
        make_record("a/x", "x", "first"),
        make_record("a/y", "y", "second"),
    ];
    let capture = store.capture(RegistrySource::Github, records).unwrap();

    assert_eq!(capture.changed, 2);
    assert_eq!(capture.unchanged, 0);
    assert_eq!(capture.manifest.item_count, 2);
    assert!(capture.path.exists());
    // Every record got a checksum assigned
    assert!(capture.snapshot.records.iter().all(|r| !r.checksum.is_empty()));
}

#[test]
fn test_unchanged_recapture_is_detected_and_bumps_last_seen() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let first = store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "desc")])
        .unwrap();
    let second = store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "desc")])
        .unwrap();

    assert_eq!(second.changed, 0);
    assert_eq!(second.unchanged, 1);
    assert!(second.manifest.items[0].last_seen >= first.manifest.items[0].last_seen);
    assert!(!second.manifest.items[0].changed);
}

#[test]
fn test_content_change_is_detected() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "old")])
        .unwrap();
    let capture = store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "new")])
        .unwrap();

    assert_eq!(capture.changed, 1);
    assert_eq!(capture.unchanged, 0);
}

#[test]
fn test_vanished_records_count_as_removed() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    store
        .capture(
            RegistrySource::Github,
            vec![
                make_record("a/x", "x", "one"),
                make_record("a/y", "y", "two"),
            ],
        )
        .unwrap();
    let capture = store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "one")])
        .unwrap();

    assert_eq!(capture.unchanged, 1);
    assert_eq!(capture.changed, 0);
    assert_eq!(capture.removed, 1);
}

#[test]
fn test_latest_returns_newest_complete_snapshot() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "v1")])
        .unwrap();
    store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "v2")])
        .unwrap();

    let latest = store.latest(RegistrySource::Github).unwrap().unwrap();
    assert_eq!(latest.records.len(), 1);
    assert_eq!(latest.records[0].description.as_deref(), Some("v2"));
}

#[test]
fn test_snapshot_without_manifest_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let complete = store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "good")])
        .unwrap();

    // Simulate a crash between snapshot and manifest writes: a snapshot file
    // with a newer stamp but no manifest sibling.
    let dir = store.registry_dir(RegistrySource::Github);
    std::fs::write(dir.join("snapshot_99999999_999999_999.json"), "{}").unwrap();

    let latest = store.latest(RegistrySource::Github).unwrap().unwrap();
    assert_eq!(latest.checksum, complete.snapshot.checksum);
}

#[test]
fn test_temp_files_are_not_treated_as_snapshots() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let dir = store.registry_dir(RegistrySource::Github);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("snapshot_00000000_000000_000.json.tmp"), "{}").unwrap();

    assert!(store.latest(RegistrySource::Github).unwrap().is_none());
}

#[test]
fn test_prune_keeps_newest() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    for version in ["v1", "v2", "v3"] {
        store
            .capture(
                RegistrySource::Github,
                vec![make_record("a/x", "x", version)],
            )
            .unwrap();
    }

    let removed = store.prune(2).unwrap();
    assert_eq!(removed, 1);

    let latest = store.latest(RegistrySource::Github).unwrap().unwrap();
    assert_eq!(latest.records[0].description.as_deref(), Some("v3"));
}

#[test]
fn test_compressed_snapshots_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let store = SnapshotStore::new(
        tmp.path(),
        &StorageConfig {
            compress: true,
            keep_snapshots: 5,
        },
    );

    store
        .capture(
            RegistrySource::Glama,
            vec![make_record("t", "time-server", "tells the time")],
        )
        .unwrap();

    let latest = store.latest(RegistrySource::Glama).unwrap().unwrap();
    assert_eq!(latest.records[0].name, "time-server");

    // Change detection still works across the compressed boundary
    let capture = store
        .capture(
            RegistrySource::Glama,
            vec![make_record("t", "time-server", "tells the time")],
        )
        .unwrap();
    assert_eq!(capture.unchanged, 1);
}

#[test]
fn test_load_all_latest_merges_registries() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    store
        .capture(RegistrySource::Github, vec![make_record("a/x", "x", "gh")])
        .unwrap();
    store
        .capture(RegistrySource::Glama, vec![make_record("y", "y", "gl")])
        .unwrap();

    let snapshots = store.load_all_latest().unwrap();
    assert_eq!(snapshots.len(), 2);
    let total: usize = snapshots.iter().map(|s| s.records.len()).sum();
    assert_eq!(total, 2);
}
