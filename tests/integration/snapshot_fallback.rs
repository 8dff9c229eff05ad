use super::{build, EPS};
use enkan::source::fs::{MemoryFs, OsFs};
use enkan::source::snapshot::{encode, write_snapshot, SnapshotPayload};
use enkan::{extract, ModeTable, WarningKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn snapshot_rebuilds_same_weights() {
    let mut memory = MemoryFs::with_files(["/pics/a/1.jpg", "/pics/a/2.jpg", "/pics/b/1.jpg"]);
    memory.add_file("/lists/set.txt", "[b2] *\n/pics/a\n[3] /pics/a/1.jpg\n/pics/b\n");
    let original = build(&memory, &["/lists/set.txt"], None);

    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("set.tree");
    write_snapshot(&snapshot, &original.tree, original.target_mode.as_ref()).unwrap();

    let reloaded = build(&OsFs::new(false), &[snapshot.to_str().unwrap()], None);
    assert_eq!(reloaded.target_mode, Some(ModeTable::parse("b2").unwrap()));
    assert!(reloaded.warnings.is_empty());
    assert_eq!(extract(&reloaded.tree), extract(&original.tree));
}

#[test]
fn corrupt_snapshot_uses_sibling_list() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("set.tree");
    fs::write(&snapshot, b"not a snapshot").unwrap();
    fs::write(
        temp.path().join("set.lst"),
        "/pics/a/1.jpg,1\n/pics/a/2.jpg,3\n",
    )
    .unwrap();

    let outcome = build(&OsFs::new(false), &[snapshot.to_str().unwrap()], None);
    assert_eq!(outcome.warnings.count(WarningKind::StaleSnapshot), 1);
    let stale = outcome
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::StaleSnapshot)
        .unwrap();
    assert_eq!(stale.source_index, Some(0));

    let extraction = extract(&outcome.tree);
    assert_eq!(extraction.paths, vec!["/pics/a/1.jpg", "/pics/a/2.jpg"]);
    assert!((extraction.weights[0] - 0.25).abs() < EPS);
    assert!((extraction.weights[1] - 0.75).abs() < EPS);
}

#[test]
fn snapshot_from_other_version_is_stale() {
    let mut memory = MemoryFs::with_files(["/pics/a/1.jpg"]);
    let payload = SnapshotPayload {
        tree: enkan::Tree::new(),
        native_mode: None,
        created_at: "2026-01-01T00:00:00+00:00".to_string(),
    };
    let mut bytes = encode(&payload).unwrap();
    bytes[4] = bytes[4].wrapping_add(1);
    memory.add_file("/cache/set.tree", bytes);
    memory.add_file("/cache/set.txt", "/pics/a\n");

    let outcome = build(&memory, &["/cache/set.tree"], None);
    assert_eq!(outcome.warnings.count(WarningKind::StaleSnapshot), 1);
    assert_eq!(outcome.tree.leaf_count(), 1);
}
