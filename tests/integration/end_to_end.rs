use super::{build, weight, EPS};
use enkan::concurrency::CancellationToken;
use enkan::source::fs::{MemoryFs, OsFs};
use enkan::source::BuildSettings;
use enkan::{build_all, extract, BuildRequest, ModeTable, WarningKind};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn pictures() -> MemoryFs {
    MemoryFs::with_files([
        "/pics/a/1.jpg",
        "/pics/a/2.jpg",
        "/pics/b/1.jpg",
        "/pics/c/1.jpg",
        "/pics/d/1.jpg",
    ])
}

#[test]
fn two_leaves_share_evenly() {
    let mut fs = pictures();
    fs.add_file("/lists/one.txt", "/pics/a\n");
    let outcome = build(&fs, &["/lists/one.txt"], None);

    assert!((weight(&outcome, "/pics/a/1.jpg") - 0.5).abs() < EPS);
    assert!((weight(&outcome, "/pics/a/2.jpg") - 0.5).abs() < EPS);
    assert!((outcome.report.total - 1.0).abs() < EPS);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn repeat_count_scales_one_leaf() {
    let mut fs = pictures();
    fs.add_file("/lists/repeat.txt", "/pics/a\n[3] /pics/a/1.jpg\n");
    let outcome = build(&fs, &["/lists/repeat.txt"], None);

    assert!((weight(&outcome, "/pics/a/1.jpg") - 0.75).abs() < EPS);
    assert!((weight(&outcome, "/pics/a/2.jpg") - 0.25).abs() < EPS);
}

#[test]
fn reservation_takes_fixed_share() {
    let mut fs = pictures();
    fs.add_file(
        "/lists/reserve.txt",
        "[%40] /pics/a\n/pics/b\n/pics/c\n/pics/d\n",
    );
    let outcome = build(&fs, &["/lists/reserve.txt"], None);

    assert!((weight(&outcome, "/pics/a") - 0.4).abs() < EPS);
    for dir in ["/pics/b", "/pics/c", "/pics/d"] {
        assert!((weight(&outcome, dir) - 0.2).abs() < EPS);
    }
    let extraction = extract(&outcome.tree);
    assert_eq!(extraction.len(), 5);
    assert!((extraction.total() - 1.0).abs() < EPS);
}

#[test]
fn later_source_weight_replaces_earlier() {
    let mut fs = pictures();
    fs.add_file("/lists/first.lst", "/pics/a/1.jpg,1\n/pics/a/2.jpg,1\n");
    fs.add_file("/lists/second.lst", "/pics/a/1.jpg,3\n");
    let outcome = build(&fs, &["/lists/first.lst", "/lists/second.lst"], None);

    assert_eq!(outcome.tree.leaf_count(), 2);
    assert!((weight(&outcome, "/pics/a/1.jpg") - 0.75).abs() < EPS);
    assert!((weight(&outcome, "/pics/a/2.jpg") - 0.25).abs() < EPS);
    assert_eq!(outcome.steps[1].added, 0);
}

#[test]
fn override_mode_replaces_source_modes() {
    let mut fs = pictures();
    fs.add_file("/lists/b2.txt", "[b2] *\n/pics/a\n/pics/b\n");

    let native = build(&fs, &["/lists/b2.txt"], None);
    assert_eq!(native.tree.mode_table, ModeTable::parse("b2").unwrap());
    assert_eq!(native.warnings.count(WarningKind::ModeMismatch), 0);

    let forced = build(&fs, &["/lists/b2.txt"], Some("w2"));
    assert_eq!(forced.tree.mode_table, ModeTable::parse("w2").unwrap());
    assert_eq!(forced.warnings.count(WarningKind::ModeMismatch), 1);
    // Weighted by leaf count: two files against one
    assert!((weight(&forced, "/pics/a") - 2.0 / 3.0).abs() < EPS);
    assert!((weight(&forced, "/pics/b") - 1.0 / 3.0).abs() < EPS);
}

#[test]
fn first_declared_mode_is_the_target() {
    let mut fs = pictures();
    fs.add_file("/lists/plain.txt", "/pics/c\n");
    fs.add_file("/lists/b2.txt", "[b2] *\n/pics/a\n");
    let outcome = build(&fs, &["/lists/plain.txt", "/lists/b2.txt"], None);

    assert_eq!(outcome.target_mode, Some(ModeTable::parse("b2").unwrap()));
    assert_eq!(outcome.warnings.count(WarningKind::DegradedDeterminism), 0);
    assert!((weight(&outcome, "/pics/c") - 0.5).abs() < EPS);
}

#[test]
fn builds_from_real_directories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("pics");
    for (dir, files) in [("x", 2), ("y", 1)] {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        for n in 0..files {
            fs::write(dir.join(format!("{}.png", n)), b"").unwrap();
        }
        fs::write(dir.join("readme.md"), b"").unwrap();
    }
    let source = temp.path().join("set.txt");
    fs::write(&source, format!("{}\n", root.display())).unwrap();

    let request = BuildRequest::new(vec![source]);
    let outcome = build_all(
        &request,
        &OsFs::new(false),
        &BuildSettings::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    let extraction = extract(&outcome.tree);
    assert_eq!(extraction.len(), 3);
    assert!(extraction.paths.iter().all(|p| p.ends_with(".png")));
    assert!((extraction.total() - 1.0).abs() < EPS);
}

proptest! {
    #[test]
    fn weights_always_sum_to_one(counts in prop::collection::vec(1usize..5, 1..6)) {
        let mut fs = MemoryFs::new();
        for (dir, count) in counts.iter().enumerate() {
            for file in 0..*count {
                fs.add_file(format!("/pics/d{}/{}.jpg", dir, file), "");
            }
        }
        fs.add_file("/lists/all.txt", "/pics\n");
        let outcome = build(&fs, &["/lists/all.txt"], None);

        let extraction = extract(&outcome.tree);
        prop_assert_eq!(extraction.len(), counts.iter().sum::<usize>());
        prop_assert!((extraction.total() - 1.0).abs() < 1e-6);
        prop_assert!(extraction.weights.iter().all(|w| *w > 0.0));
    }
}
