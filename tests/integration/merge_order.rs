use super::{build, weight, EPS};
use enkan::source::fs::MemoryFs;
use enkan::tree::hasher::fingerprint;
use enkan::{Severity, WarningKind};

fn sources() -> MemoryFs {
    let mut fs = MemoryFs::with_files(["/pics/a/1.jpg", "/pics/b/1.jpg", "/pics/b/2.jpg"]);
    fs.add_file("/lists/x.txt", "/pics/a\n[200%] /pics/b\n");
    fs.add_file("/lists/y.txt", "/pics/a\n[50%] /pics/b\n");
    fs
}

#[test]
fn order_decides_conflicts() {
    let fs = sources();
    let xy = build(&fs, &["/lists/x.txt", "/lists/y.txt"], None);
    let yx = build(&fs, &["/lists/y.txt", "/lists/x.txt"], None);

    assert!((weight(&xy, "/pics/b") - 1.0 / 3.0).abs() < EPS);
    assert!((weight(&yx, "/pics/b") - 2.0 / 3.0).abs() < EPS);
    assert_ne!(fingerprint(&xy.tree), fingerprint(&yx.tree));
}

#[test]
fn same_order_same_tree() {
    let fs = sources();
    let first = build(&fs, &["/lists/x.txt", "/lists/y.txt"], None);
    let second = build(&fs, &["/lists/x.txt", "/lists/y.txt"], None);
    assert_eq!(fingerprint(&first.tree), fingerprint(&second.tree));
    assert_eq!(first.warnings.into_vec(), second.warnings.into_vec());
}

#[test]
fn undeclared_modes_degrade_determinism() {
    let fs = sources();
    let outcome = build(&fs, &["/lists/x.txt", "/lists/y.txt"], None);
    let degraded: Vec<_> = outcome
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::DegradedDeterminism)
        .collect();
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0].severity, Severity::Warning);
}

#[test]
fn graft_below_level_one_aborts_branch() {
    let mut fs = MemoryFs::with_files(["/pics/a/1.jpg", "/pics/b/1.jpg"]);
    fs.add_file("/lists/deep.txt", "[b2] *\n/pics/a\n");
    // Native rung 3, target rung 2: the graft would land at level 0
    fs.add_file("/lists/graft.txt", "[b3] *\n[g1] /pics/b\n");
    let outcome = build(&fs, &["/lists/deep.txt", "/lists/graft.txt"], None);

    assert_eq!(outcome.steps[1].offset, -1);
    assert_eq!(outcome.steps[1].aborted, 1);
    assert!(outcome.warnings.has_errors());
    assert!(outcome.tree.lookup_str("/pics/b/1.jpg").is_none());
    assert!((weight(&outcome, "/pics/a/1.jpg") - 1.0).abs() < EPS);
}
