use atlas_core::config::AtlasConfig;
use atlas_core::record::RegistrySource;
use atlas_loader::memory::MemoryStore;
use atlas_pipeline::{Pipeline, RunOptions};
use tempfile::TempDir;

fn write_dump(data_dir: &std::path::Path, registry_dir: &str, content: &str) {
    let dir = data_dir.join("scraped").join(registry_dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("dump.json"), content).unwrap();
}

/// Two registries with an overlapping server, a naming-variant pair, and one
/// malformed item.
fn setup_dumps(data_dir: &std::path::Path) {
    write_dump(
        data_dir,
        "github",
        r#"[
            {
                "id": "microsoft/playwright-mcp",
                "name": "playwright-mcp",
                "author": "microsoft",
                "repository": "https://github.com/microsoft/playwright-mcp",
                "description": "Browser automation for agents",
                "categories": ["development_tools"],
                "operations": ["execute"],
                "popularity_score": 9000,
                "tools": [{"name": "navigate"}]
            },
            {
                "id": "microsoft/vscode-mcp",
                "name": "vscode-mcp",
                "author": "microsoft",
                "repository": "https://github.com/microsoft/vscode-mcp",
                "categories": ["development_tools"]
            },
            {
                "name": "time-server",
                "description": "Tells the time",
                "categories": ["other"]
            }
        ]"#,
    );
    write_dump(
        data_dir,
        "glama",
        r#"{"servers": [
            {
                "id": "1",
                "name": "Playwright MCP",
                "author": "Microsoft",
                "repository": "microsoft/playwright-mcp",
                "download_count": 5000
            },
            {"id": "2", "name": "Time Server", "description": "Tells the time"},
            {"id": "3", "name": "   "}
        ]}"#,
    );
}

fn options(registries: &[RegistrySource]) -> RunOptions {
    RunOptions {
        force_refresh: false,
        registries: registries.to_vec(),
        clear: true,
        skip_load: false,
    }
}

#[test]
fn test_full_run_resolves_and_loads() {
    let tmp = TempDir::new().unwrap();
    setup_dumps(tmp.path());

    let pipeline = Pipeline::new(tmp.path(), AtlasConfig::default());
    let store = MemoryStore::new();
    let opts = options(&[RegistrySource::Github, RegistrySource::Glama]);
    let adapters = pipeline.default_adapters(&opts);

    let summary = pipeline.run(&opts, adapters, &store).unwrap();

    // Ingestion: 3 + 2 converted records, one malformed glama item
    assert_eq!(summary.registries.len(), 2);
    assert_eq!(summary.records_fetched, 5);
    assert_eq!(summary.registries["glama"].invalid, 1);
    assert!(summary.registries["github"].error.is_none());

    // Resolution: playwright merged across registries, the time-server
    // naming variants merged, vscode-mcp distinct
    assert_eq!(summary.records_rejected, 0);
    assert_eq!(summary.entities_resolved, 3);
    assert_eq!(summary.merge_conflicts, 0);

    // Inference: the two microsoft servers share an author
    assert_eq!(summary.edges_created, 1);

    // Load: one entity batch + one edge batch
    assert_eq!(summary.batches_committed, 2);
    assert_eq!(summary.batches_failed, 0);
    assert_eq!(store.entity_count(), 3);
    assert_eq!(store.edge_count(), 1);

    // The merged entity carries both registries in provenance and the max
    // of each popularity metric
    let playwright = store.get_entity("microsoft/playwright-mcp").unwrap();
    assert_eq!(playwright.provenance.len(), 2);
    assert_eq!(playwright.popularity_score, Some(9000));
    assert_eq!(playwright.download_count, Some(5000));
}

#[test]
fn test_failed_registry_is_isolated() {
    let tmp = TempDir::new().unwrap();
    setup_dumps(tmp.path());

    let pipeline = Pipeline::new(tmp.path(), AtlasConfig::default());
    let store = MemoryStore::new();
    // mcp.so has no dump directory and must fail without hurting the others
    let opts = options(&[
        RegistrySource::Github,
        RegistrySource::Glama,
        RegistrySource::McpSo,
    ]);
    let adapters = pipeline.default_adapters(&opts);

    let summary = pipeline.run(&opts, adapters, &store).unwrap();

    assert!(summary.registries["mcp.so"].error.is_some());
    assert!(summary.registries["github"].error.is_none());
    assert!(summary.registries["glama"].error.is_none());
    assert_eq!(summary.entities_resolved, 3);
    assert_eq!(store.entity_count(), 3);
}

#[test]
fn test_unchanged_rerun_reuses_master_and_skips_entities() {
    let tmp = TempDir::new().unwrap();
    setup_dumps(tmp.path());

    let pipeline = Pipeline::new(tmp.path(), AtlasConfig::default());
    let store = MemoryStore::new();
    let opts = options(&[RegistrySource::Github, RegistrySource::Glama]);

    let adapters = pipeline.default_adapters(&opts);
    pipeline.run(&opts, adapters, &store).unwrap();

    // Second run: same dumps, incremental load
    let rerun_opts = RunOptions {
        clear: false,
        ..options(&[RegistrySource::Github, RegistrySource::Glama])
    };
    let adapters = pipeline.default_adapters(&rerun_opts);
    let summary = pipeline.run(&rerun_opts, adapters, &store).unwrap();

    assert_eq!(summary.records_unchanged, 5);
    assert_eq!(summary.entities_resolved, 3);
    // No entity checksum moved, so only the edge batch was sent
    assert_eq!(summary.batches_committed, 1);
    assert_eq!(store.entity_count(), 3);
}

#[test]
fn test_stale_marking_on_shrunken_registry() {
    let tmp = TempDir::new().unwrap();
    setup_dumps(tmp.path());

    let pipeline = Pipeline::new(tmp.path(), AtlasConfig::default());
    let store = MemoryStore::new();
    let opts = options(&[RegistrySource::Github, RegistrySource::Glama]);
    let adapters = pipeline.default_adapters(&opts);
    pipeline.run(&opts, adapters, &store).unwrap();

    // vscode-mcp disappears from github
    write_dump(
        tmp.path(),
        "github",
        r#"[
            {
                "id": "microsoft/playwright-mcp",
                "name": "playwright-mcp",
                "author": "microsoft",
                "repository": "https://github.com/microsoft/playwright-mcp",
                "description": "Browser automation for agents",
                "categories": ["development_tools"],
                "operations": ["execute"],
                "popularity_score": 9000,
                "tools": [{"name": "navigate"}]
            },
            {
                "name": "time-server",
                "description": "Tells the time",
                "categories": ["other"]
            }
        ]"#,
    );

    let rerun_opts = RunOptions {
        clear: false,
        force_refresh: true,
        ..options(&[RegistrySource::Github, RegistrySource::Glama])
    };
    let adapters = pipeline.default_adapters(&rerun_opts);
    let summary = pipeline.run(&rerun_opts, adapters, &store).unwrap();

    // The vanished entity is marked stale, never deleted
    assert_eq!(summary.entities_stale, 1);
    let graph = pipeline.load_graph().unwrap();
    let vscode = graph.get_entity("microsoft/vscode-mcp").unwrap();
    assert!(vscode.stale);
    // Stale entities keep no edges; the remaining pair has none in common
    assert_eq!(summary.edges_created, 0);
}

#[test]
fn test_invalid_items_are_counted_not_dropped() {
    let tmp = TempDir::new().unwrap();
    write_dump(
        tmp.path(),
        "github",
        r#"[{"description": "no name at all"}, {"name": "ok-server"}]"#,
    );

    let pipeline = Pipeline::new(tmp.path(), AtlasConfig::default());
    let store = MemoryStore::new();
    let opts = options(&[RegistrySource::Github]);
    let adapters = pipeline.default_adapters(&opts);

    let summary = pipeline.run(&opts, adapters, &store).unwrap();
    assert_eq!(summary.registries["github"].invalid, 1);
    assert_eq!(summary.registries["github"].fetched, 1);
    assert_eq!(summary.entities_resolved, 1);
}
