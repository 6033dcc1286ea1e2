//! Attribute snapshots.
//!
//! The tree only knows a modification time, so all three kernel timestamps are
//! reported as that instant. Ownership is synthetic: every entry belongs to the
//! uid/gid the session was configured with.

use std::time::{Duration, SystemTime};

use super::tree::TreeMetadata;
use super::{EntryKind, InodeAddr, Permissions};

/// How long the kernel may cache attributes and entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheTtl {
    /// [`CacheTtl::DEFAULT_DURATION`].
    #[default]
    Default,
    /// No caching: the kernel asks again on every access.
    Disabled,
    /// Cache for the given duration.
    For(Duration),
}

impl CacheTtl {
    /// One year. The tree is read-only, so cached attributes never go stale.
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Negative disables caching, zero selects the default, positive caches for
    /// that many seconds.
    #[must_use]
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => Self::Disabled,
            0 => Self::Default,
            s => Self::For(Duration::from_secs(s.cast_unsigned())),
        }
    }

    /// The effective duration, or `None` when caching is disabled.
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Default => Some(Self::DEFAULT_DURATION),
            Self::Disabled => None,
            Self::For(d) if d.is_zero() => Some(Self::DEFAULT_DURATION),
            Self::For(d) => Some(d),
        }
    }
}

/// A point-in-time copy of an entry's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub size: u64,
    pub kind: EntryKind,
    pub perm: Permissions,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// When the kernel must revalidate, if caching is enabled.
    pub expires: Option<SystemTime>,
}

const BLOCK_SIZE: u32 = 4096;

impl Attributes {
    /// Convert to the fuser attribute record for inode `ino`.
    #[must_use]
    pub fn to_fuser(&self, ino: InodeAddr) -> fuser::FileAttr {
        fuser::FileAttr {
            ino,
            size: self.size,
            blocks: self.size.div_ceil(512),
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            crtime: self.mtime,
            kind: self.kind.into(),
            perm: self.perm.bits(),
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

impl From<EntryKind> for fuser::FileType {
    fn from(val: EntryKind) -> Self {
        match val {
            EntryKind::RegularFile => Self::RegularFile,
            EntryKind::Directory => Self::Directory,
            EntryKind::CharDevice => Self::CharDevice,
            EntryKind::BlockDevice => Self::BlockDevice,
            EntryKind::NamedPipe => Self::NamedPipe,
            EntryKind::Symlink => Self::Symlink,
            EntryKind::Socket => Self::Socket,
        }
    }
}

/// Converts tree metadata to [`Attributes`] with a fixed owner and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrMapper {
    uid: u32,
    gid: u32,
    ttl: Option<Duration>,
}

impl AttrMapper {
    #[must_use]
    pub fn new(uid: u32, gid: u32, ttl: CacheTtl) -> Self {
        Self {
            uid,
            gid,
            ttl: ttl.duration(),
        }
    }

    /// The cache duration, or `None` when caching is disabled.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The TTL to hand the kernel: zero when caching is disabled.
    #[must_use]
    pub fn kernel_ttl(&self) -> Duration {
        self.ttl.unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn map(&self, meta: &TreeMetadata) -> Attributes {
        Attributes {
            size: meta.size,
            kind: meta.kind,
            perm: meta.perm,
            atime: meta.modified,
            mtime: meta.modified,
            ctime: meta.modified,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            expires: self.ttl.and_then(|ttl| SystemTime::now().checked_add(ttl)),
        }
    }
}
