use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use super::error::TreeFsError;
use super::tree::{FileTree, TreeFile};
use super::{FileHandle, InodeAddr, SharedTables};

/// An open tree object registered under a [`FileHandle`].
pub struct OpenHandle<F> {
    path: String,
    file: F,
    cursor: Mutex<()>,
}

impl<F: TreeFile> OpenHandle<F> {
    /// The tree path this handle was opened on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The underlying tree object.
    #[must_use]
    pub fn file(&self) -> &F {
        &self.file
    }

    /// Exclusive use of the object's sequential cursor.
    ///
    /// Held across a seek and the reads that follow it.
    pub fn lock_cursor(&self) -> MutexGuard<'_, ()> {
        self.cursor.lock()
    }
}

/// Maps handle ids to open tree objects.
///
/// Every open yields a fresh handle, even for an inode that is already open.
#[must_use]
pub struct HandleTable<F> {
    tables: SharedTables<F>,
    next_fh: AtomicU64,
}

impl<F: TreeFile> HandleTable<F> {
    pub(crate) fn new(tables: SharedTables<F>) -> Self {
        Self {
            tables,
            next_fh: AtomicU64::new(1),
        }
    }

    /// Open the path behind `inode` and register the object.
    pub fn open_for<T>(&self, tree: &T, inode: InodeAddr) -> Result<FileHandle, TreeFsError>
    where
        T: FileTree<File = F>,
    {
        let path = self
            .tables
            .read()
            .inode_paths
            .get(&inode)
            .cloned()
            .ok_or_else(|| TreeFsError::NotFound {
                path: format!("<inode {inode}>"),
            })?;
        let file = tree
            .open(&path)
            .map_err(|e| TreeFsError::from_tree(&path, e))?;

        let handle = Arc::new(OpenHandle {
            path,
            file,
            cursor: Mutex::new(()),
        });
        let mut tables = self.tables.write();
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        trace!(fh, inode, path = handle.path(), "registered handle");
        tables.files.insert(fh, handle);
        Ok(fh)
    }

    /// The open object behind `fh`.
    #[must_use]
    pub fn get(&self, fh: FileHandle) -> Option<Arc<OpenHandle<F>>> {
        self.tables.read().files.get(&fh).cloned()
    }

    /// Unregister `fh` and close its object. Unknown handles are ignored.
    pub fn release(&self, fh: FileHandle) {
        let removed = self.tables.write().files.remove(&fh);
        match removed {
            Some(handle) => {
                if let Err(e) = handle.file().close() {
                    debug!(fh, path = handle.path(), error = %e, "close reported error");
                }
                trace!(fh, "released handle");
            }
            None => trace!(fh, "release of unknown handle"),
        }
    }

    /// Number of handles currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.tables.read().files.len()
    }
}
