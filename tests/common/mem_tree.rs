#![allow(missing_docs, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tree_fs::fs::tree::{
    FileTree, ReadAt, ReadWholeFile, Seekable, TreeDirEntry, TreeFile, TreeMetadata,
};
use tree_fs::fs::{EntryKind, Permissions};

/// Which optional read capabilities a [`MemTree`] advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub read_at: bool,
    pub seek: bool,
    pub whole_file: bool,
}

impl Caps {
    pub const ALL: Self = Self {
        read_at: true,
        seek: true,
        whole_file: true,
    };
    pub const NONE: Self = Self {
        read_at: false,
        seek: false,
        whole_file: false,
    };
}

/// Call counters shared between a [`MemTree`] and every file it opens.
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub read_at_calls: AtomicUsize,
    pub seek_calls: AtomicUsize,
    pub seq_reads: AtomicUsize,
    pub whole_file_calls: AtomicUsize,
    pub read_dir_calls: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Vec<u8>>),
    Dir(Vec<TreeDirEntry>),
}

pub fn mtime() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// An in-memory tree. Paths are relative to `"."`.
#[derive(Debug, Clone)]
pub struct MemTree {
    nodes: HashMap<String, Node>,
    caps: Caps,
    /// Upper bound on bytes returned by a single read call.
    chunk: usize,
    failing_stat: HashSet<String>,
    pub counters: Arc<Counters>,
}

impl Default for MemTree {
    fn default() -> Self {
        Self {
            nodes: HashMap::from([(".".to_owned(), Node::Dir(Vec::new()))]),
            caps: Caps::ALL,
            chunk: usize::MAX,
            failing_stat: HashSet::new(),
            counters: Arc::new(Counters::default()),
        }
    }
}

impl MemTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, path: &str, kind: EntryKind, node: Node) -> Self {
        let (parent, name) = path.rsplit_once('/').unwrap_or((".", path));
        match self.nodes.get_mut(parent) {
            Some(Node::Dir(children)) => children.push(TreeDirEntry::new(name, kind)),
            _ => panic!("parent {parent:?} of {path:?} is not a directory"),
        }
        self.nodes.insert(path.to_owned(), node);
        self
    }

    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.add(
            path,
            EntryKind::RegularFile,
            Node::File(Arc::new(data.to_vec())),
        )
    }

    pub fn dir(self, path: &str) -> Self {
        self.add(path, EntryKind::Directory, Node::Dir(Vec::new()))
    }

    pub fn with_caps(mut self, caps: Caps) -> Self {
        self.caps = caps;
        self
    }

    /// Cap every individual read at `chunk` bytes.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Make `stat` on `path` fail with a non-NotFound error.
    pub fn with_failing_stat(mut self, path: &str) -> Self {
        self.failing_stat.insert(path.to_owned());
        self
    }
}

pub struct MemFile {
    path: String,
    node: Node,
    caps: Caps,
    chunk: usize,
    fail_stat: bool,
    cursor: Mutex<usize>,
    counters: Arc<Counters>,
}

impl MemFile {
    fn data(&self) -> io::Result<&[u8]> {
        match &self.node {
            Node::File(data) => Ok(data),
            Node::Dir(_) => Err(io::Error::other(format!("{} is a directory", self.path))),
        }
    }

    fn copy_from(&self, pos: usize, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data()?;
        let start = pos.min(data.len());
        let n = buf.len().min(data.len() - start).min(self.chunk);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}

impl TreeFile for MemFile {
    fn stat(&self) -> io::Result<TreeMetadata> {
        if self.fail_stat {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "stat refused"));
        }
        let (size, kind, perm) = match &self.node {
            Node::File(data) => (
                data.len() as u64,
                EntryKind::RegularFile,
                Permissions::OWNER_READ | Permissions::OWNER_WRITE | Permissions::GROUP_READ,
            ),
            Node::Dir(_) => (
                0,
                EntryKind::Directory,
                Permissions::OWNER_RWX | Permissions::GROUP_READ | Permissions::GROUP_EXECUTE,
            ),
        };
        Ok(TreeMetadata {
            size,
            kind,
            perm,
            modified: mtime(),
        })
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.counters.seq_reads.fetch_add(1, Ordering::SeqCst);
        let mut cursor = self.cursor.lock().unwrap();
        let n = self.copy_from(*cursor, buf)?;
        *cursor += n;
        Ok(n)
    }

    fn close(&self) -> io::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        self.caps.read_at.then_some(self as &dyn ReadAt)
    }

    fn as_seekable(&self) -> Option<&dyn Seekable> {
        self.caps.seek.then_some(self as &dyn Seekable)
    }
}

impl ReadAt for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.counters.read_at_calls.fetch_add(1, Ordering::SeqCst);
        self.copy_from(usize::try_from(offset).unwrap(), buf)
    }
}

impl Seekable for MemFile {
    fn seek(&self, offset: u64) -> io::Result<u64> {
        self.counters.seek_calls.fetch_add(1, Ordering::SeqCst);
        *self.cursor.lock().unwrap() = usize::try_from(offset).unwrap();
        Ok(offset)
    }
}

impl FileTree for MemTree {
    type File = MemFile;

    fn open(&self, path: &str) -> io::Result<MemFile> {
        let node = self
            .nodes
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MemFile {
            path: path.to_owned(),
            node,
            caps: self.caps,
            chunk: self.chunk,
            fail_stat: self.failing_stat.contains(path),
            cursor: Mutex::new(0),
            counters: Arc::clone(&self.counters),
        })
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<TreeDirEntry>> {
        self.counters.read_dir_calls.fetch_add(1, Ordering::SeqCst);
        match self.nodes.get(path) {
            Some(Node::Dir(children)) => Ok(children.clone()),
            Some(Node::File(_)) => Err(io::Error::other(format!("{path} is not a directory"))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, path.to_owned())),
        }
    }

    fn as_whole_file_reader(&self) -> Option<&dyn ReadWholeFile> {
        self.caps.whole_file.then_some(self as &dyn ReadWholeFile)
    }
}

impl ReadWholeFile for MemTree {
    fn read_whole_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.counters.whole_file_calls.fetch_add(1, Ordering::SeqCst);
        match self.nodes.get(path) {
            Some(Node::File(data)) => Ok(data.to_vec()),
            Some(Node::Dir(_)) => Err(io::Error::other(format!("{path} is a directory"))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, path.to_owned())),
        }
    }
}
