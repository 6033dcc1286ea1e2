#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use tree_fs::fs::inode_table::{ForgetEntry, join_path};
use tree_fs::fs::{ROOT_INODE, ROOT_PATH};

use common::{make_fs, sample_tree};

#[test]
fn root_is_pre_seeded() {
    let fs = make_fs(sample_tree());
    let inodes = fs.inodes();

    assert_eq!(inodes.path_of(ROOT_INODE).as_deref(), Some(ROOT_PATH));
    assert_eq!(inodes.refcount(ROOT_INODE), Some(1));
    assert_eq!(inodes.inode_count(), 1);
    assert_eq!(inodes.intern_path(ROOT_PATH), ROOT_INODE);
}

#[test]
fn intern_is_stable_and_distinct() {
    let fs = make_fs(sample_tree());
    let inodes = fs.inodes();

    let a = inodes.intern_path("a.txt");
    let b = inodes.intern_path("sub");
    assert_eq!(inodes.intern_path("a.txt"), a, "same path, same inode");
    assert_ne!(a, b, "different paths, different inodes");
    assert!(a > ROOT_INODE && b > ROOT_INODE);
    assert_eq!(inodes.path_of(b).as_deref(), Some("sub"));
}

#[test]
fn lookup_counts_references() {
    let fs = make_fs(sample_tree());
    let first = fs.lookup(ROOT_INODE, "a.txt").unwrap();
    let second = fs.lookup(ROOT_INODE, "a.txt").unwrap();

    assert_eq!(first.inode, second.inode);
    assert_eq!(fs.inodes().refcount(first.inode), Some(2));
}

#[test]
fn forget_to_zero_evicts_and_bumps_generation() {
    let fs = make_fs(sample_tree());
    let ino = fs.lookup(ROOT_INODE, "a.txt").unwrap().inode;
    fs.lookup(ROOT_INODE, "a.txt").unwrap();
    fs.lookup(ROOT_INODE, "a.txt").unwrap();
    let generation = fs.inodes().generation();

    fs.forget(ino, 1).unwrap();
    assert_eq!(fs.inodes().refcount(ino), Some(2), "partial forget decrements");
    assert_eq!(fs.inodes().path_of(ino).as_deref(), Some("a.txt"));

    fs.forget(ino, 2).unwrap();
    assert_eq!(fs.inodes().refcount(ino), None);
    assert_eq!(fs.inodes().path_of(ino), None, "evicted inode has no path");
    assert!(
        fs.inodes().generation() > generation,
        "eviction must bump the generation"
    );

    fs.forget(ino, 1).unwrap();
    assert_eq!(fs.inodes().inode_count(), 1, "further forgets are no-ops");
}

#[test]
fn evicted_inode_is_never_reissued() {
    let fs = make_fs(sample_tree());
    let old = fs.lookup(ROOT_INODE, "a.txt").unwrap();
    fs.forget(old.inode, 1).unwrap();

    let new = fs.lookup(ROOT_INODE, "a.txt").unwrap();
    assert_ne!(new.inode, old.inode, "identifiers come from a monotonic sequence");
    assert!(new.generation > old.generation);
    assert_eq!(fs.inodes().refcount(new.inode), Some(1));
}

#[test]
fn forget_zero_counts_as_one() {
    let fs = make_fs(sample_tree());
    let ino = fs.lookup(ROOT_INODE, "a.txt").unwrap().inode;
    fs.lookup(ROOT_INODE, "a.txt").unwrap();

    fs.forget(ino, 0).unwrap();
    assert_eq!(fs.inodes().refcount(ino), Some(1));
    fs.forget(ino, 0).unwrap();
    assert_eq!(fs.inodes().refcount(ino), None);
}

#[test]
fn forget_more_than_held_evicts() {
    let fs = make_fs(sample_tree());
    let ino = fs.lookup(ROOT_INODE, "sub").unwrap().inode;
    fs.forget(ino, 10).unwrap();
    assert_eq!(fs.inodes().path_of(ino), None);
}

#[test]
fn root_survives_any_forget() {
    let fs = make_fs(sample_tree());
    fs.forget(ROOT_INODE, 1).unwrap();
    fs.forget(ROOT_INODE, 100).unwrap();

    assert_eq!(fs.inodes().path_of(ROOT_INODE).as_deref(), Some(ROOT_PATH));
    assert_eq!(fs.inodes().refcount(ROOT_INODE), Some(1));
    assert_eq!(fs.inodes().generation(), 0, "root is never evicted");
}

#[test]
fn forget_of_unknown_inode_is_noop() {
    let fs = make_fs(sample_tree());
    fs.forget(999, 1).unwrap();
    assert_eq!(fs.inodes().inode_count(), 1);
}

#[test]
fn batch_forget_processes_every_entry() {
    let fs = make_fs(sample_tree());
    let a = fs.lookup(ROOT_INODE, "a.txt").unwrap().inode;
    let sub = fs.lookup(ROOT_INODE, "sub").unwrap().inode;
    fs.lookup(ROOT_INODE, "sub").unwrap();

    fs.batch_forget([
        ForgetEntry {
            inode: 12345,
            nlookup: 1,
        },
        ForgetEntry {
            inode: a,
            nlookup: 1,
        },
        ForgetEntry {
            inode: sub,
            nlookup: 1,
        },
    ])
    .unwrap();

    assert_eq!(fs.inodes().path_of(a), None, "a.txt should be evicted");
    assert_eq!(fs.inodes().refcount(sub), Some(1), "sub keeps one reference");
}

#[test]
fn resolve_against_unknown_parent_uses_root() {
    let fs = make_fs(sample_tree());
    assert_eq!(fs.inodes().resolve(4242, "a.txt"), "a.txt");
}

#[test]
fn join_path_cleans_components() {
    assert_eq!(join_path(ROOT_PATH, "a.txt"), "a.txt");
    assert_eq!(join_path("sub", "b"), "sub/b");
    assert_eq!(join_path("sub", ".."), ROOT_PATH);
    assert_eq!(join_path("a/b", "../c"), "a/c");
    assert_eq!(join_path(ROOT_PATH, ".."), ROOT_PATH, "cannot climb above root");
    assert_eq!(join_path(ROOT_PATH, "."), ROOT_PATH);
}

#[test]
fn acquire_interns_and_references_together() {
    let fs = make_fs(sample_tree());
    let inodes = fs.inodes();

    let (ino, rc) = inodes.acquire("sub");
    assert_eq!(rc, 1);
    assert_eq!(inodes.intern_path("sub"), ino, "acquire interns the path");
    assert_eq!(inodes.acquire("sub"), (ino, 2));
    assert_eq!(inodes.increment_ref(ino), 3);

    fs.forget(ino, 3).unwrap();
    assert_eq!(inodes.path_of(ino), None);
}
