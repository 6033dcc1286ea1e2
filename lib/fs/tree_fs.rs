//! Protocol operation handlers.
//!
//! [`TreeFs`] owns all session state for one mount: the inode table, the handle
//! table, and the lock both share. Each operation performs at most one call
//! into the tree (plus the close of a transient object) and returns a tagged
//! [`TreeFsError`] that the transport maps to an errno.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::attr::{AttrMapper, Attributes, CacheTtl};
use super::dirent::{Dirent, write_dirent};
use super::error::TreeFsError;
use super::handle_table::HandleTable;
use super::inode_table::{ForgetEntry, InodeTable};
use super::read::read_handle;
use super::tree::FileTree;
use super::{EntryKind, FileHandle, Generation, InodeAddr, ROOT_INODE, ROOT_PATH, Tables};

/// Settings applied once when a [`TreeFs`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeFsConfig {
    /// Owner reported for every entry.
    pub uid: u32,
    /// Group reported for every entry.
    pub gid: u32,
    /// How long the kernel may cache attributes and entries.
    pub cache_ttl: CacheTtl,
}

impl Default for TreeFsConfig {
    fn default() -> Self {
        Self {
            uid: nix::unistd::Uid::current().as_raw(),
            gid: nix::unistd::Gid::current().as_raw(),
            cache_ttl: CacheTtl::Default,
        }
    }
}

/// The reply to a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub inode: InodeAddr,
    pub generation: Generation,
    pub attributes: Attributes,
}

/// The reply to a successful file open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedFile {
    pub handle: FileHandle,
    /// The kernel may keep cached pages across opens; nothing here invalidates them.
    pub keep_page_cache: bool,
}

/// One child produced by [`TreeFs::directory_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub inode: InodeAddr,
    /// Position to resume after this entry.
    pub offset: u64,
    pub name: String,
    pub kind: EntryKind,
}

/// Exposes a [`FileTree`] through the kernel's stateful inode/handle protocol.
pub struct TreeFs<T: FileTree> {
    tree: T,
    mapper: AttrMapper,
    inodes: InodeTable<T::File>,
    handles: HandleTable<T::File>,
}

impl<T: FileTree> TreeFs<T> {
    /// Create a session over `tree`. The root inode is pre-seeded.
    pub fn new(tree: T, config: TreeFsConfig) -> Self {
        let tables = Arc::new(RwLock::new(Tables::with_root()));
        Self {
            tree,
            mapper: AttrMapper::new(config.uid, config.gid, config.cache_ttl),
            inodes: InodeTable::new(Arc::clone(&tables)),
            handles: HandleTable::new(tables),
        }
    }

    #[must_use]
    pub fn tree(&self) -> &T {
        &self.tree
    }

    #[must_use]
    pub fn mapper(&self) -> &AttrMapper {
        &self.mapper
    }

    #[must_use]
    pub fn inodes(&self) -> &InodeTable<T::File> {
        &self.inodes
    }

    #[must_use]
    pub fn handles(&self) -> &HandleTable<T::File> {
        &self.handles
    }

    /// Resolve `name` in `parent`, taking one kernel reference on the result.
    pub fn lookup(&self, parent: InodeAddr, name: &str) -> Result<Entry, TreeFsError> {
        let path = self.inodes.resolve(parent, name);
        let attributes = self.inodes.attributes_for(&self.tree, &self.mapper, &path)?;
        let (inode, rc) = self.inodes.acquire(&path);
        trace!(parent, name, inode, rc, "lookup resolved");
        Ok(Entry {
            inode,
            generation: self.inodes.generation(),
            attributes,
        })
    }

    /// Fresh attributes for `inode`.
    pub fn get_attributes(&self, inode: InodeAddr) -> Result<Attributes, TreeFsError> {
        let path = match self.inodes.path_of(inode) {
            Some(path) => path,
            None if inode == ROOT_INODE => ROOT_PATH.to_owned(),
            None => {
                return Err(TreeFsError::NotFound {
                    path: format!("<inode {inode}>"),
                });
            }
        };
        self.inodes.attributes_for(&self.tree, &self.mapper, &path)
    }

    pub fn forget(&self, inode: InodeAddr, nlookup: u64) -> Result<(), TreeFsError> {
        self.inodes.forget(inode, nlookup)
    }

    pub fn batch_forget(
        &self,
        entries: impl IntoIterator<Item = ForgetEntry>,
    ) -> Result<(), TreeFsError> {
        self.inodes.batch_forget(entries)
    }

    pub fn open_directory(&self, inode: InodeAddr) -> Result<FileHandle, TreeFsError> {
        self.handles.open_for(&self.tree, inode)
    }

    /// List `inode`'s children from position `offset` onwards.
    ///
    /// Every listed child is interned so its inode is stable across pages.
    /// Offsets are entry positions: the entry at index `i` resumes at `i + 1`.
    pub fn directory_entries(
        &self,
        inode: InodeAddr,
        handle: FileHandle,
        offset: u64,
    ) -> Result<Vec<DirListing>, TreeFsError> {
        let mut listing = Vec::new();
        self.each_directory_entry(inode, handle, offset, |entry| {
            listing.push(entry);
            true
        })?;
        Ok(listing)
    }

    /// Serialize `inode`'s children from position `offset` onwards into `dst`.
    ///
    /// Stops at the first record that does not fit. Returns the bytes written.
    pub fn read_directory(
        &self,
        inode: InodeAddr,
        handle: FileHandle,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<usize, TreeFsError> {
        let mut written = 0;
        self.each_directory_entry(inode, handle, offset, |entry| {
            let n = write_dirent(
                &mut dst[written..],
                &Dirent {
                    inode: entry.inode,
                    offset: entry.offset,
                    name: &entry.name,
                    kind: entry.kind,
                },
            );
            written += n;
            n != 0
        })?;
        Ok(written)
    }

    /// Feed each child at or after `offset` to `sink` until it returns false.
    fn each_directory_entry(
        &self,
        inode: InodeAddr,
        handle: FileHandle,
        offset: u64,
        mut sink: impl FnMut(DirListing) -> bool,
    ) -> Result<(), TreeFsError> {
        if self.handles.get(handle).is_none() {
            return Err(TreeFsError::InvalidHandle(handle));
        }
        let dir = self
            .inodes
            .path_of(inode)
            .ok_or_else(|| TreeFsError::NotFound {
                path: format!("<inode {inode}>"),
            })?;
        let children = self
            .tree
            .read_dir(&dir)
            .map_err(|e| TreeFsError::from_tree(&dir, e))?;

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        for (pos, child) in children.into_iter().enumerate().skip(skip) {
            let child_path = super::inode_table::join_path(&dir, &child.name);
            let listing = DirListing {
                inode: self.inodes.intern_path(&child_path),
                offset: pos as u64 + 1,
                kind: child.kind.unwrap_or_default(),
                name: child.name,
            };
            if !sink(listing) {
                debug!(inode, offset = pos, "buffer full, stopping readdir");
                break;
            }
        }
        Ok(())
    }

    pub fn release_directory_handle(&self, handle: FileHandle) {
        self.handles.release(handle);
    }

    pub fn open_file(&self, inode: InodeAddr) -> Result<OpenedFile, TreeFsError> {
        let handle = self.handles.open_for(&self.tree, inode)?;
        Ok(OpenedFile {
            handle,
            keep_page_cache: true,
        })
    }

    /// Read from `offset` into `dst`. A read past the end is short, not an error.
    pub fn read_file(
        &self,
        handle: FileHandle,
        inode: InodeAddr,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<usize, TreeFsError> {
        let open = self
            .handles
            .get(handle)
            .ok_or(TreeFsError::InvalidHandle(handle))?;
        let n = read_handle(&self.tree, &open, offset, dst)
            .map_err(|e| TreeFsError::io(open.path(), e))?;
        trace!(handle, inode, offset, n, "read served");
        Ok(n)
    }

    pub fn release_file_handle(&self, handle: FileHandle) {
        self.handles.release(handle);
    }

    /// Nothing is buffered, so there is nothing to flush.
    pub fn flush(&self, _handle: FileHandle) -> Result<(), TreeFsError> {
        Ok(())
    }
}
