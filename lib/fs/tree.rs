//! The read-only tree the adapter exposes.
//!
//! Paths are slash-separated and relative to the tree root, which is `"."`. A
//! missing entry must be reported as [`std::io::ErrorKind::NotFound`]; every
//! other error kind is surfaced to the kernel as an I/O failure.
//!
//! Optional capabilities are probed per call through the `as_*` methods. The
//! default implementations report the capability as absent.

use std::io;
use std::time::SystemTime;

use super::{EntryKind, Permissions};

/// Metadata reported by [`TreeFile::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeMetadata {
    /// Size in bytes.
    pub size: u64,
    /// The type of the entry.
    pub kind: EntryKind,
    /// Permission bits.
    pub perm: Permissions,
    /// Last modification time. The only timestamp the tree provides.
    pub modified: SystemTime,
}

/// One child of a directory, as returned by [`FileTree::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeDirEntry {
    /// The entry's name within its parent.
    pub name: String,
    /// The entry's type, if the tree knows it without a stat.
    pub kind: Option<EntryKind>,
}

impl TreeDirEntry {
    /// Creates an entry with a known type.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
        }
    }
}

/// Positioned reads that do not disturb any cursor.
pub trait ReadAt {
    /// Read into `buf` starting at byte `offset`. Returns `Ok(0)` at end of data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Repositioning of a file's sequential cursor.
pub trait Seekable {
    /// Move the cursor to absolute byte `offset`, returning the new position.
    fn seek(&self, offset: u64) -> io::Result<u64>;
}

/// Whole-content reads by path, offered by trees that hold contents in memory.
pub trait ReadWholeFile {
    /// Read the full contents of the file at `path`.
    fn read_whole_file(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// An open object of the tree: a regular file or a directory.
pub trait TreeFile: Send + Sync + 'static {
    /// Current metadata of the object.
    fn stat(&self) -> io::Result<TreeMetadata>;

    /// Sequential read from the object's cursor. Returns `Ok(0)` at end of data.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release any resources held by the object.
    ///
    /// Called exactly once, when the adapter is done with the object. The
    /// default implementation is a no-op.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    /// The positioned-read capability, if supported.
    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        None
    }

    /// The seek capability, if supported.
    fn as_seekable(&self) -> Option<&dyn Seekable> {
        None
    }
}

/// A read-only hierarchical file tree.
pub trait FileTree: Send + Sync + 'static {
    /// The object type returned by [`open`](Self::open).
    type File: TreeFile;

    /// Open the entry at `path`.
    fn open(&self, path: &str) -> io::Result<Self::File>;

    /// List the children of the directory at `path`, in a stable order.
    fn read_dir(&self, path: &str) -> io::Result<Vec<TreeDirEntry>>;

    /// The bulk whole-file capability, if supported.
    fn as_whole_file_reader(&self) -> Option<&dyn ReadWholeFile> {
        None
    }
}
