//! Read-only tree adapter: maps an abstract file tree onto FUSE session state.
/// Attribute snapshots and the synthetic-owner mapper.
pub mod attr;
/// A [`tree::FileTree`] backed by a directory on the host.
pub mod dir_tree;
/// Directory-entry record encoding.
pub mod dirent;
mod error;
/// FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`tree_fs::TreeFs`].
pub mod fuser;
/// Open handle bookkeeping.
pub mod handle_table;
/// Path ⇄ inode bookkeeping with reference counts.
pub mod inode_table;
/// Capability-ranked file reads.
pub mod read;
/// The abstract tree interface consumed by the adapter.
pub mod tree;
/// Protocol operation handlers.
pub mod tree_fs;

pub use attr::{AttrMapper, Attributes, CacheTtl};
pub use error::TreeFsError;
pub use tree_fs::{DirListing, Entry, OpenedFile, TreeFs, TreeFsConfig};

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;

use handle_table::OpenHandle;

/// Type representing an inode identifier.
pub type InodeAddr = u64;

/// Type representing a file handle.
pub type FileHandle = u64;

/// Type representing an inode generation number.
pub type Generation = u64;

/// The inode permanently bound to the tree root.
pub const ROOT_INODE: InodeAddr = 1;

/// The path the root inode resolves to.
pub const ROOT_PATH: &str = ".";

bitflags! {
    /// Permission bits for an entry, similar to Unix file permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u16 {
        /// Other: execute permission.
        const OTHER_EXECUTE = 1 << 0;
        /// Other: write permission.
        const OTHER_WRITE   = 1 << 1;
        /// Other: read permission.
        const OTHER_READ    = 1 << 2;

        /// Group: execute permission.
        const GROUP_EXECUTE = 1 << 3;
        /// Group: write permission.
        const GROUP_WRITE   = 1 << 4;
        /// Group: read permission.
        const GROUP_READ    = 1 << 5;

        /// Owner: execute permission.
        const OWNER_EXECUTE = 1 << 6;
        /// Owner: write permission.
        const OWNER_WRITE   = 1 << 7;
        /// Owner: read permission.
        const OWNER_READ    = 1 << 8;

        /// Sticky bit.
        const STICKY        = 1 << 9;
        /// Set-group-ID bit.
        const SETGID        = 1 << 10;
        /// Set-user-ID bit.
        const SETUID        = 1 << 11;

        /// Other: read, write, and execute.
        const OTHER_RWX = Self::OTHER_READ.bits()
            | Self::OTHER_WRITE.bits()
            | Self::OTHER_EXECUTE.bits();
        /// Group: read, write, and execute.
        const GROUP_RWX = Self::GROUP_READ.bits()
            | Self::GROUP_WRITE.bits()
            | Self::GROUP_EXECUTE.bits();
        /// Owner: read, write, and execute.
        const OWNER_RWX = Self::OWNER_READ.bits()
            | Self::OWNER_WRITE.bits()
            | Self::OWNER_EXECUTE.bits();
    }
}

/// The type of an entry in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    /// A regular file.
    #[default]
    RegularFile,
    /// A directory.
    Directory,
    /// A character device.
    CharDevice,
    /// A block device.
    BlockDevice,
    /// A named pipe.
    NamedPipe,
    /// A symbolic link. Reported as-is, never followed.
    Symlink,
    /// A Unix domain socket.
    Socket,
}

/// All mutable session state, guarded by a single lock shared between the
/// [`inode_table::InodeTable`] and the [`handle_table::HandleTable`].
pub(crate) struct Tables<F> {
    /// inode -> path
    pub(crate) inode_paths: HashMap<InodeAddr, String>,
    /// path -> inode
    pub(crate) path_inodes: HashMap<String, InodeAddr>,
    /// inode -> outstanding kernel references
    pub(crate) refcounts: HashMap<InodeAddr, u64>,
    /// handle -> open tree object
    pub(crate) files: HashMap<FileHandle, Arc<OpenHandle<F>>>,
}

impl<F> Tables<F> {
    /// Tables pre-seeded with the root inode (path ".", refcount 1).
    pub(crate) fn with_root() -> Self {
        Self {
            inode_paths: HashMap::from([(ROOT_INODE, ROOT_PATH.to_owned())]),
            path_inodes: HashMap::from([(ROOT_PATH.to_owned(), ROOT_INODE)]),
            refcounts: HashMap::from([(ROOT_INODE, 1)]),
            files: HashMap::new(),
        }
    }
}

/// The lock shared by every table of one [`TreeFs`] session.
pub(crate) type SharedTables<F> = Arc<parking_lot::RwLock<Tables<F>>>;
