use locutions::persist::{staged, StorePaths};
use locutions::{ColdSnapshot, Counts, Store, StoreError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn seed(dir: &Path, keys: &[&str]) {
    fs::write(dir.join("keys.txt"), format!("{}\n", keys.join("\n"))).unwrap();
    let ones: Vec<u8> = keys.iter().flat_map(|_| 1u32.to_le_bytes()).collect();
    fs::write(dir.join("tf.bin"), &ones).unwrap();
    fs::write(dir.join("df.bin"), &ones).unwrap();
    fs::write(dir.join("total.bin"), 1u32.to_le_bytes()).unwrap();
}

fn read_u32s(path: &Path) -> Vec<u32> {
    fs::read(path)
        .unwrap()
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn hot_counts_over_seeded_store() {
    let dir = tempdir().unwrap();
    seed(dir.path(), &["je", "mange", "des", "carottes"]);
    let mut hot = Store::open(dir.path(), false).unwrap();
    assert_eq!(hot.ordinal("des").unwrap(), 2);
    assert_eq!(hot.get("des"), Counts::new(1, 1));

    hot.add_document(["des", "patates", "et", "des", "petits", "pois"]).unwrap();
    assert_eq!(hot.get("des"), Counts::new(3, 2));
    assert_eq!(hot.len(), 8);
    assert_eq!(
        hot.keys().collect::<Vec<_>>(),
        vec!["je", "mange", "des", "carottes", "patates", "et", "petits", "pois"]
    );
    assert_eq!(hot.cold().get("des"), Some(Counts::new(1, 1)));
    assert_eq!(hot.total(), 2);

    hot.write().unwrap();
    assert_eq!(hot.cold().get("des"), Some(Counts::new(3, 2)));
    assert_eq!(read_u32s(&dir.path().join("tf.bin"))[2], 3);
    assert_eq!(read_u32s(&dir.path().join("tf.bin")).len(), 8);
    let keys = fs::read_to_string(dir.path().join("keys.txt")).unwrap();
    assert_eq!(keys.lines().last(), Some("pois"));
    assert_eq!(read_u32s(&dir.path().join("total.bin")), vec![2]);
}

#[test]
fn reopen_round_trip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    let mut s = Store::open(&root, true).unwrap();
    s.add_document(["je", "mange", "des", "carottes"]).unwrap();
    s.add_counter([("des", 4), ("pois", 2)]).unwrap();
    s.write().unwrap();
    let before: Vec<(String, Counts)> = s.items().collect();

    let reopened = Store::open(&root, false).unwrap();
    assert_eq!(reopened.items().collect::<Vec<_>>(), before);
    assert_eq!(reopened.total(), 2);
    assert_eq!(reopened.get("des"), Counts::new(5, 2));
}

#[test]
fn ordinals_survive_flushes() {
    let dir = tempdir().unwrap();
    let mut s = Store::open(dir.path(), true).unwrap();
    s.add_document(["b", "a"]).unwrap();
    let b = s.ordinal("b").unwrap();
    let a = s.ordinal("a").unwrap();
    for round in 0..3 {
        s.add_document([format!("k{round}"), "a".to_string()]).unwrap();
        s.write().unwrap();
        assert_eq!(s.ordinal("b").unwrap(), b);
        assert_eq!(s.ordinal("a").unwrap(), a);
    }
    let reopened = Store::open(dir.path(), false).unwrap();
    assert_eq!(reopened.ordinal("b").unwrap(), 0);
    assert_eq!(reopened.ordinal("k2").unwrap(), 4);
    assert_eq!(reopened.get("a"), Counts::new(4, 4));
    assert_eq!(reopened.len(), 5);
}

#[test]
fn merge_then_write_is_additive() {
    let dir = tempdir().unwrap();
    let mut a = Store::open(dir.path().join("a"), true).unwrap();
    let mut b = Store::open(dir.path().join("b"), true).unwrap();
    a.add_counter([("x", 1), ("y", 2)]).unwrap();
    b.add_counter([("y", 3), ("z", 1)]).unwrap();
    a.write().unwrap();
    b.write().unwrap();

    a.merge(&b);
    a.write().unwrap();
    assert_eq!(a.get("y"), Counts::new(5, 2));
    assert_eq!(a.get("x"), Counts::new(1, 1));
    assert_eq!(a.get("z"), Counts::new(1, 1));
    assert_eq!(a.total(), 2);

    // b's files are untouched by the merge
    let b_again = ColdSnapshot::open(dir.path().join("b"), false).unwrap();
    assert_eq!(b_again.get("y"), Some(Counts::new(3, 1)));
}

#[test]
fn merge_order_does_not_change_counts() {
    let dir = tempdir().unwrap();
    let mut parts = Vec::new();
    for (i, doc) in [vec!["p", "q"], vec!["q", "r", "q"], vec!["s"]].into_iter().enumerate() {
        let mut s = Store::open(dir.path().join(format!("part{i}")), true).unwrap();
        s.add_document(doc).unwrap();
        parts.push(s);
    }
    let mut forward = Store::open(dir.path().join("fwd"), true).unwrap();
    let mut backward = Store::open(dir.path().join("bwd"), true).unwrap();
    for p in &parts {
        forward.merge(p);
    }
    for p in parts.iter().rev() {
        backward.merge(p);
    }
    forward.write().unwrap();
    backward.write().unwrap();
    for key in ["p", "q", "r", "s"] {
        assert_eq!(forward.get(key), backward.get(key));
    }
    assert_eq!(forward.get("q"), Counts::new(3, 2));
    assert_eq!(forward.total(), 3);
    assert_eq!(backward.keys().next().as_deref(), Some("s"));
}

#[test]
fn empty_store_lifecycle() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("empty");
    let mut s = Store::open(&root, true).unwrap();
    assert_eq!(s.len(), 0);
    assert_eq!(s.total(), 0);
    s.write().unwrap();
    assert_eq!(fs::metadata(root.join("keys.txt")).unwrap().len(), 0);
    assert_eq!(fs::metadata(root.join("tf.bin")).unwrap().len(), 0);
    assert_eq!(fs::metadata(root.join("df.bin")).unwrap().len(), 0);
    assert_eq!(read_u32s(&root.join("total.bin")), vec![0]);
    assert!(Store::open(&root, false).unwrap().is_empty());
}

#[test]
fn open_errors() {
    let dir = tempdir().unwrap();
    let err = Store::open(dir.path().join("nope"), false).unwrap_err();
    assert!(err.is_not_found());

    seed(dir.path(), &["a", "b"]);
    fs::remove_file(dir.path().join("total.bin")).unwrap();
    assert!(matches!(Store::open(dir.path(), false), Err(StoreError::CorruptStore { .. })));
}

#[test]
fn crash_before_marker_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    let mut s = Store::open(dir.path(), true).unwrap();
    s.add_document(["a"]).unwrap();
    s.write().unwrap();

    // staged files from a flush that never reached its commit marker
    let paths = StorePaths::new(dir.path());
    fs::write(staged(&paths.keys()), "a\nb\n").unwrap();
    fs::write(staged(&paths.tf()), [1u8, 0, 0, 0]).unwrap();

    let reopened = Store::open(dir.path(), false).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get("a"), Counts::new(1, 1));
    assert!(!staged(&paths.keys()).exists());
}
