//! Path ⇄ inode mapping with kernel reference counts.
//!
//! The tree has no notion of inodes, so identities are handed out on first
//! sight of a path and held for as long as the kernel holds a reference.
//! Identifiers come from a monotonic sequence and are never reissued; the
//! generation counter is bumped every time an identifier is reclaimed.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use super::attr::{AttrMapper, Attributes};
use super::error::TreeFsError;
use super::tree::{FileTree, TreeFile};
use super::{Generation, InodeAddr, ROOT_INODE, ROOT_PATH, SharedTables};

/// One `(inode, nlookup)` pair of a batch forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForgetEntry {
    pub inode: InodeAddr,
    pub nlookup: u64,
}

/// Join `name` onto the slash-separated `base`, cleaning `.` and `..`.
///
/// `..` never climbs above the root.
#[must_use]
pub fn join_path(base: &str, name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in base.split('/').chain(name.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        ROOT_PATH.to_owned()
    } else {
        parts.join("/")
    }
}

/// Bidirectional path/inode map plus reference counts.
pub struct InodeTable<F> {
    tables: SharedTables<F>,
    next_inode: AtomicU64,
    generation: AtomicU64,
}

impl<F> InodeTable<F> {
    pub(crate) fn new(tables: SharedTables<F>) -> Self {
        Self {
            tables,
            next_inode: AtomicU64::new(ROOT_INODE + 1),
            generation: AtomicU64::new(0),
        }
    }

    /// The path for `name` inside directory `parent`.
    ///
    /// An unknown parent resolves against the root.
    #[must_use]
    pub fn resolve(&self, parent: InodeAddr, name: &str) -> String {
        let tables = self.tables.read();
        if let Some(base) = tables.inode_paths.get(&parent) {
            join_path(base, name)
        } else {
            warn!(parent, name, "resolve against unknown parent inode");
            join_path("", name)
        }
    }

    /// The path `inode` currently resolves to.
    #[must_use]
    pub fn path_of(&self, inode: InodeAddr) -> Option<String> {
        self.tables.read().inode_paths.get(&inode).cloned()
    }

    /// Return the inode for `path`, allocating one if the path is new.
    ///
    /// Concurrent callers interning the same new path all observe the same
    /// identifier.
    pub fn intern_path(&self, path: &str) -> InodeAddr {
        // Fast path: read-lock.
        if let Some(&ino) = self.tables.read().path_inodes.get(path) {
            return ino;
        }
        // Slow path: write-lock with re-check.
        let mut tables = self.tables.write();
        if let Some(&ino) = tables.path_inodes.get(path) {
            return ino;
        }
        let ino = self.next_inode.fetch_add(1, Ordering::Relaxed);
        tables.path_inodes.insert(path.to_owned(), ino);
        tables.inode_paths.insert(ino, path.to_owned());
        trace!(ino, path, "allocated inode");
        ino
    }

    /// Stat `path` through the tree: open, stat, close.
    pub fn attributes_for<T>(
        &self,
        tree: &T,
        mapper: &AttrMapper,
        path: &str,
    ) -> Result<Attributes, TreeFsError>
    where
        T: FileTree<File = F>,
        F: TreeFile,
    {
        let file = tree
            .open(path)
            .map_err(|e| TreeFsError::from_tree(path, e))?;
        let stat = file.stat();
        if let Err(e) = file.close() {
            trace!(path, error = %e, "transient close failed");
        }
        let meta = stat.map_err(|e| TreeFsError::io(path, e))?;
        Ok(mapper.map(&meta))
    }

    /// Intern `path` and take one kernel reference on it, atomically.
    ///
    /// A concurrent forget cannot evict the inode between the two steps.
    /// Returns the inode and its new reference count.
    pub fn acquire(&self, path: &str) -> (InodeAddr, u64) {
        let mut tables = self.tables.write();
        let ino = match tables.path_inodes.get(path) {
            Some(&ino) => ino,
            None => {
                let ino = self.next_inode.fetch_add(1, Ordering::Relaxed);
                tables.path_inodes.insert(path.to_owned(), ino);
                tables.inode_paths.insert(ino, path.to_owned());
                trace!(ino, path, "allocated inode");
                ino
            }
        };
        let rc = tables.refcounts.entry(ino).or_insert(0);
        *rc += 1;
        (ino, *rc)
    }

    /// Record one more kernel reference to `inode`. Returns the new count.
    pub fn increment_ref(&self, inode: InodeAddr) -> u64 {
        let mut tables = self.tables.write();
        let rc = tables.refcounts.entry(inode).or_insert(0);
        *rc += 1;
        *rc
    }

    /// Drop `nlookup` kernel references to `inode`; zero counts as one.
    ///
    /// When no references remain the inode is removed from both maps. The
    /// root inode is never removed. Forgetting an unknown inode is a no-op.
    pub fn forget(&self, inode: InodeAddr, nlookup: u64) -> Result<(), TreeFsError> {
        let n = nlookup.max(1);
        let mut tables = self.tables.write();
        let Some(rc) = tables.refcounts.get_mut(&inode) else {
            trace!(inode, "forget on unreferenced inode");
            return Ok(());
        };
        if inode == ROOT_INODE {
            // Pinned: the count never drops below the construction reference.
            *rc = rc.saturating_sub(n).max(1);
            return Ok(());
        }
        if *rc > n {
            *rc -= n;
            trace!(inode, new_rc = *rc, "decremented rc");
            return Ok(());
        }
        tables.refcounts.remove(&inode);
        if let Some(path) = tables.inode_paths.remove(&inode) {
            tables.path_inodes.remove(&path);
        }
        self.generation.fetch_add(1, Ordering::Relaxed);
        trace!(inode, "evicted inode");
        Ok(())
    }

    /// Forget every entry, then report the first failure, if any.
    pub fn batch_forget(
        &self,
        entries: impl IntoIterator<Item = ForgetEntry>,
    ) -> Result<(), TreeFsError> {
        let mut first_err = None;
        for entry in entries {
            if let Err(e) = self.forget(entry.inode, entry.nlookup) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// The generation in effect for newly returned entries.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation.load(Ordering::Relaxed)
    }

    /// Outstanding kernel references to `inode`, if it has any.
    #[must_use]
    pub fn refcount(&self, inode: InodeAddr) -> Option<u64> {
        self.tables.read().refcounts.get(&inode).copied()
    }

    /// Number of inodes currently mapped, root included.
    #[must_use]
    pub fn inode_count(&self) -> usize {
        self.tables.read().inode_paths.len()
    }
}
