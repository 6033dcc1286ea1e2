#![allow(dead_code, missing_docs, clippy::unwrap_used)]

pub mod mem_tree;

use tree_fs::fs::{CacheTtl, TreeFs, TreeFsConfig};

use mem_tree::MemTree;

pub const TEST_UID: u32 = 1000;
pub const TEST_GID: u32 = 1000;

pub fn test_config() -> TreeFsConfig {
    TreeFsConfig {
        uid: TEST_UID,
        gid: TEST_GID,
        cache_ttl: CacheTtl::Default,
    }
}

/// The canonical fixture: `/a.txt` holding `"abcd"` and an empty `/sub`.
pub fn sample_tree() -> MemTree {
    MemTree::new().file("a.txt", b"abcd").dir("sub")
}

pub fn make_fs(tree: MemTree) -> TreeFs<MemTree> {
    TreeFs::new(tree, test_config())
}
