//! Integration tests for lattice-store
//!
//! These run against a real temporary git repository and exercise the
//! whole store/get/query/sync surface.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use lattice_domain::{Coordinate, MAX_CONTENT_BYTES, STORAGE_DIR};
use lattice_store::{MemoryManager, RangeQuery, StoreError};

fn git_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for args in [
        vec!["init"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "Test"],
    ] {
        let output = Command::new("git")
            .args(&args)
            .current_dir(dir.path())
            .output()
            .expect("git available");
        assert!(output.status.success(), "git {args:?} failed");
    }
    dir
}

fn coord(x: &str, y: u8, z: u8) -> Coordinate {
    Coordinate::new(x, y, z).unwrap()
}

#[test]
fn test_construction_requires_existing_git_repo() {
    let missing = MemoryManager::new("/definitely/not/a/repo", "agent-1");
    assert!(matches!(missing, Err(StoreError::Storage { .. })));

    let plain_dir = tempfile::tempdir().unwrap();
    let not_git = MemoryManager::new(plain_dir.path(), "agent-1");
    assert!(matches!(not_git, Err(StoreError::Storage { .. })));
}

#[test]
fn test_construction_rejects_blank_agent() {
    let repo = git_repo();
    assert!(matches!(
        MemoryManager::new(repo.path(), ""),
        Err(StoreError::InvalidAgent)
    ));
    assert!(matches!(
        MemoryManager::new(repo.path(), "   "),
        Err(StoreError::InvalidAgent)
    ));
}

#[test]
fn test_store_and_get_round_trip() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    let c = coord("proj-abc", 2, 3);
    let mut context = BTreeMap::new();
    context.insert("title".to_string(), "Pick a database".to_string());
    let stored = manager.store(&c, "use PostgreSQL", Some(context.clone())).unwrap();
    assert_eq!(stored.agent_id, "agent-1");
    assert_eq!(stored.issue_context, Some(context));

    let fetched = manager.get(&c).unwrap().expect("record present");
    assert_eq!(fetched, stored);
    assert!(manager.exists(&c));
    assert_eq!(manager.record_count(), 1);

    // The record landed at the deterministic path
    assert!(repo
        .path()
        .join(STORAGE_DIR)
        .join("x-proj-abc")
        .join("y-2-z-3.json")
        .exists());
}

#[test]
fn test_get_on_empty_cell_is_none_not_error() {
    let repo = git_repo();
    let manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    let c = coord("proj-abc", 1, 1);
    assert_eq!(manager.get(&c).unwrap(), None);
    assert!(!manager.exists(&c));
}

#[test]
fn test_architecture_layer_is_immutable() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    let c = coord("issue-b02", 2, 1);
    manager.store(&c, "use X", None).unwrap();

    let second = manager.store(&c, "use Y instead", None);
    assert!(matches!(second, Err(StoreError::ImmutableLayer(_))));

    // The original decision is untouched
    let surviving = manager.get(&c).unwrap().unwrap();
    assert_eq!(surviving.content, "use X");
}

#[test]
fn test_mutable_layers_are_last_writer_wins() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    for z in 2..=4 {
        let c = coord("proj-abc", 2, z);
        manager.store(&c, "v1", None).unwrap();
        manager.store(&c, "v2", None).unwrap();
        assert_eq!(manager.get(&c).unwrap().unwrap().content, "v2");
    }
}

#[test]
fn test_content_is_validated_before_io() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    let c = coord("proj-abc", 1, 1);

    for bad in ["", "   \n"] {
        assert!(matches!(
            manager.store(&c, bad, None),
            Err(StoreError::InvalidContent(_))
        ));
    }

    let oversized = "a".repeat(MAX_CONTENT_BYTES + 1);
    assert!(matches!(
        manager.store(&c, &oversized, None),
        Err(StoreError::InvalidContent(_))
    ));

    // Nothing was written and the cell is still empty
    assert!(!manager.exists(&c));
    assert!(manager.store(&c, "a valid decision", None).is_ok());
}

#[test]
fn test_query_range_filters_each_axis() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    for (x, y, z) in [
        ("proj-aaa", 1, 1),
        ("proj-aaa", 3, 2),
        ("proj-bbb", 2, 3),
        ("proj-ccc", 5, 4),
    ] {
        manager.store(&coord(x, y, z), format!("{x}/{y}/{z}").as_str(), None).unwrap();
    }

    let all = manager.query_range(&RangeQuery::default()).unwrap();
    assert_eq!(all.len(), 4);

    let hits = manager
        .query_range(&RangeQuery {
            x_range: Some(("proj-aaa", "proj-bbb")),
            y_range: Some((2, 5)),
            ..Default::default()
        })
        .unwrap();
    let tuples: Vec<_> = hits.iter().map(|r| r.coordinate.to_tuple()).collect();
    assert_eq!(tuples, vec![("proj-aaa", 3, 2), ("proj-bbb", 2, 3)]);
}

#[test]
fn test_query_range_rejects_inverted_bounds() {
    let repo = git_repo();
    let manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    let inverted_y = manager.query_range(&RangeQuery {
        y_range: Some((4, 2)),
        ..Default::default()
    });
    assert!(matches!(inverted_y, Err(StoreError::Query(_))));

    let inverted_z = manager.query_range(&RangeQuery {
        z_range: Some((3, 1)),
        ..Default::default()
    });
    assert!(matches!(inverted_z, Err(StoreError::Query(_))));
}

#[test]
fn test_partial_order_with_topological_ranking() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    for x in ["proj-aaa", "proj-bbb", "proj-ccc", "proj-ddd"] {
        manager.store(&coord(x, 2, 2), "decision", None).unwrap();
    }
    let ranking: HashMap<String, usize> = [
        ("proj-aaa".to_string(), 0),
        ("proj-bbb".to_string(), 1),
        ("proj-ccc".to_string(), 2),
        ("proj-ddd".to_string(), 3),
    ]
    .into();

    let hits = manager
        .query_partial_order("proj-ccc", 3, None, Some(&ranking))
        .unwrap();
    let xs: Vec<_> = hits.iter().map(|r| r.coordinate.x().to_string()).collect();
    assert_eq!(xs, vec!["proj-aaa", "proj-bbb", "proj-ccc"]);
}

#[test]
fn test_partial_order_validates_thresholds() {
    let repo = git_repo();
    let manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    assert!(matches!(
        manager.query_partial_order("proj-abc", 0, None, None),
        Err(StoreError::Coordinate(_))
    ));
    assert!(matches!(
        manager.query_partial_order("proj-abc", 7, None, None),
        Err(StoreError::Coordinate(_))
    ));
    assert!(matches!(
        manager.query_partial_order("proj-abc", 2, Some(5), None),
        Err(StoreError::Coordinate(_))
    ));

    // One past the last stage is a valid threshold
    assert!(manager.query_partial_order("proj-abc", 6, None, None).is_ok());
}

#[test]
fn test_search_content_matches_and_ranks() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();

    manager
        .store(&coord("proj-aaa", 1, 2), "Use the PostgreSQL database", None)
        .unwrap();
    manager
        .store(&coord("proj-bbb", 1, 2), "Expose a REST API", None)
        .unwrap();
    manager
        .store(
            &coord("proj-ccc", 1, 2),
            "REST API backed by the PostgreSQL database",
            None,
        )
        .unwrap();

    let hits = manager.search_content(&["database"], false).unwrap();
    let xs: Vec<_> = hits.iter().map(|r| r.coordinate.x()).collect();
    assert_eq!(xs.len(), 2);
    assert!(!xs.contains(&"proj-bbb"));

    // The record containing both terms ranks first
    let hits = manager.search_content(&["database", "rest"], false).unwrap();
    assert_eq!(hits[0].coordinate.x(), "proj-ccc");

    let hits = manager.search_content(&["database", "rest"], true).unwrap();
    let xs: Vec<_> = hits.iter().map(|r| r.coordinate.x()).collect();
    assert_eq!(xs, vec!["proj-ccc"]);
}

#[test]
fn test_search_content_rejects_empty_terms() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    assert!(matches!(
        manager.search_content(&[], false),
        Err(StoreError::Query(_))
    ));
}

#[test]
fn test_new_instance_rebuilds_index_from_disk() {
    let repo = git_repo();
    let c = coord("proj-abc", 2, 1);
    {
        let mut writer = MemoryManager::new(repo.path(), "agent-1").unwrap();
        writer.store(&c, "durable decision about the database", None).unwrap();
    }

    let mut reader = MemoryManager::new(repo.path(), "agent-2").unwrap();
    assert_eq!(reader.record_count(), 1);
    assert_eq!(
        reader.get(&c).unwrap().unwrap().content,
        "durable decision about the database"
    );
    // Content was indexed during the rebuild, so search works immediately
    assert_eq!(reader.search_content(&["database"], false).unwrap().len(), 1);
}

#[test]
fn test_recover_is_header_only_until_searched() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    manager
        .store(&coord("proj-abc", 2, 1), "decision about the database", None)
        .unwrap();

    assert_eq!(manager.recover(), 1);
    assert_eq!(manager.record_count(), 1);

    // The cold content index forces a reload inside search_content
    let hits = manager.search_content(&["database"], false).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_rebuild_skips_corrupt_files() {
    let repo = git_repo();
    {
        let mut writer = MemoryManager::new(repo.path(), "agent-1").unwrap();
        writer.store(&coord("proj-abc", 2, 1), "good decision", None).unwrap();
    }
    // A corrupt sibling must not block recovery of the healthy record
    let cell_dir = repo.path().join(STORAGE_DIR).join("x-proj-zzz");
    fs::create_dir_all(&cell_dir).unwrap();
    fs::write(cell_dir.join("y-1-z-1.json"), "{ truncated").unwrap();

    let manager = MemoryManager::new(repo.path(), "agent-2").unwrap();
    assert_eq!(manager.record_count(), 1);
}

#[test]
fn test_vanished_file_degrades_to_absent() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    let c = coord("proj-abc", 2, 3);
    manager.store(&c, "soon to vanish", None).unwrap();

    fs::remove_file(repo.path().join(STORAGE_DIR).join("x-proj-abc").join("y-2-z-3.json"))
        .unwrap();

    assert_eq!(manager.get(&c).unwrap(), None);
    assert!(!manager.exists(&c));
    // Hydrating queries silently drop the vanished coordinate
    assert!(manager.query_range(&RangeQuery::default()).unwrap().is_empty());
}

#[test]
fn test_sync_commits_changes_once() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    manager.store(&coord("proj-abc", 1, 1), "commit me", None).unwrap();

    manager.sync(None).unwrap();

    // Tree is clean now; log shows the default message
    let log = Command::new("git")
        .args(["log", "--oneline"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    let log = String::from_utf8_lossy(&log.stdout).into_owned();
    assert!(log.contains("lattice-memory: sync 1 decision(s)"), "log was: {log}");

    // Nothing pending: sync is a no-op, not an error
    manager.sync(None).unwrap();
}

#[test]
fn test_sync_uses_custom_message() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    manager.store(&coord("proj-abc", 1, 1), "commit me", None).unwrap();
    manager.sync(Some("checkpoint before rollback")).unwrap();

    let log = Command::new("git")
        .args(["log", "--oneline"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&log.stdout).contains("checkpoint before rollback"));
}

#[test]
fn test_lock_artifacts_are_colocated() {
    let repo = git_repo();
    let mut manager = MemoryManager::new(repo.path(), "agent-1").unwrap();
    manager.store(&coord("proj-abc", 2, 1), "decision", None).unwrap();

    let lock: &Path = &repo
        .path()
        .join(STORAGE_DIR)
        .join("x-proj-abc")
        .join("y-2-z-1.json.lock");
    assert!(lock.exists(), "lock artifact should sit beside the record");
}
