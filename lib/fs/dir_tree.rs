//! A [`FileTree`] over a directory on the host.
//!
//! Files support positioned reads and seeking. Symbolic links are reported as
//! links and never followed.

use std::fs::{File, Metadata};
use std::io::{self, Read as _, Seek as _, SeekFrom};
use std::os::unix::fs::{FileExt as _, FileTypeExt as _, MetadataExt as _};
use std::path::{Path, PathBuf};

use super::tree::{FileTree, ReadAt, Seekable, TreeDirEntry, TreeFile, TreeMetadata};
use super::{EntryKind, Permissions};

fn kind_of(ft: std::fs::FileType) -> EntryKind {
    if ft.is_dir() {
        EntryKind::Directory
    } else if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_char_device() {
        EntryKind::CharDevice
    } else if ft.is_block_device() {
        EntryKind::BlockDevice
    } else if ft.is_fifo() {
        EntryKind::NamedPipe
    } else if ft.is_socket() {
        EntryKind::Socket
    } else {
        EntryKind::RegularFile
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "permission bits fit in the low 12 bits of the mode"
)]
fn tree_metadata(meta: &Metadata) -> io::Result<TreeMetadata> {
    Ok(TreeMetadata {
        size: meta.len(),
        kind: kind_of(meta.file_type()),
        perm: Permissions::from_bits_truncate((meta.mode() & 0o7777) as u16),
        modified: meta.modified()?,
    })
}

enum Inner {
    Open(File),
    Link(TreeMetadata),
}

/// An entry opened from a [`DirTree`].
pub struct DirFile {
    inner: Inner,
}

impl DirFile {
    fn file(&self) -> io::Result<&File> {
        match &self.inner {
            Inner::Open(file) => Ok(file),
            Inner::Link(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "symbolic links are not followed",
            )),
        }
    }
}

impl TreeFile for DirFile {
    fn stat(&self) -> io::Result<TreeMetadata> {
        match &self.inner {
            Inner::Open(file) => tree_metadata(&file.metadata()?),
            Inner::Link(meta) => Ok(*meta),
        }
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file()?;
        file.read(buf)
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        matches!(self.inner, Inner::Open(_)).then_some(self as &dyn ReadAt)
    }

    fn as_seekable(&self) -> Option<&dyn Seekable> {
        matches!(self.inner, Inner::Open(_)).then_some(self as &dyn Seekable)
    }
}

impl ReadAt for DirFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file()?.read_at(buf, offset)
    }
}

impl Seekable for DirFile {
    fn seek(&self, offset: u64) -> io::Result<u64> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(offset))
    }
}

/// Serves the contents of a host directory.
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a tree path onto the host, refusing to leave the root.
    fn host_path(&self, path: &str) -> io::Result<PathBuf> {
        let mut host = self.root.clone();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path {path:?} escapes the tree root"),
                    ));
                }
                p => host.push(p),
            }
        }
        Ok(host)
    }
}

impl FileTree for DirTree {
    type File = DirFile;

    fn open(&self, path: &str) -> io::Result<DirFile> {
        let host = self.host_path(path)?;
        let meta = std::fs::symlink_metadata(&host)?;
        let inner = if meta.file_type().is_symlink() {
            Inner::Link(tree_metadata(&meta)?)
        } else {
            Inner::Open(File::open(&host)?)
        };
        Ok(DirFile { inner })
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<TreeDirEntry>> {
        let host = self.host_path(path)?;
        let mut entries = std::fs::read_dir(host)?
            .map(|entry| {
                let entry = entry?;
                Ok(TreeDirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    kind: entry.file_type().ok().map(kind_of),
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        // Host order is unspecified; paging needs a stable one.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
