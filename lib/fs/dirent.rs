//! Encoding of directory entries in the kernel's `fuse_dirent` layout.
//!
//! Each record is `ino: u64, off: u64, namelen: u32, type: u32` followed by the
//! name, padded with zeros to an 8-byte boundary. All integers are native
//! endian.

use super::{EntryKind, InodeAddr};

const HEADER_LEN: usize = 8 + 8 + 4 + 4;
const ALIGN: usize = 8;

/// `d_type` codes from `<dirent.h>`.
#[must_use]
pub fn dirent_type(kind: EntryKind) -> u32 {
    let dt = match kind {
        EntryKind::RegularFile => libc::DT_REG,
        EntryKind::Directory => libc::DT_DIR,
        EntryKind::CharDevice => libc::DT_CHR,
        EntryKind::BlockDevice => libc::DT_BLK,
        EntryKind::NamedPipe => libc::DT_FIFO,
        EntryKind::Symlink => libc::DT_LNK,
        EntryKind::Socket => libc::DT_SOCK,
    };
    u32::from(dt)
}

/// One record to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirent<'a> {
    pub inode: InodeAddr,
    /// Opaque position of the *next* entry; passed back by the kernel to resume.
    pub offset: u64,
    pub name: &'a str,
    pub kind: EntryKind,
}

impl Dirent<'_> {
    /// Encoded size including padding.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        (HEADER_LEN + self.name.len()).next_multiple_of(ALIGN)
    }
}

/// Write `entry` at the start of `dst`.
///
/// Returns the number of bytes written, or 0 if the record does not fit.
#[expect(
    clippy::cast_possible_truncation,
    reason = "names are bounded by NAME_MAX, far below u32::MAX"
)]
pub fn write_dirent(dst: &mut [u8], entry: &Dirent<'_>) -> usize {
    let len = entry.encoded_len();
    if len > dst.len() {
        return 0;
    }
    let name = entry.name.as_bytes();
    let (header, rest) = dst[..len].split_at_mut(HEADER_LEN);
    header[0..8].copy_from_slice(&entry.inode.to_ne_bytes());
    header[8..16].copy_from_slice(&entry.offset.to_ne_bytes());
    header[16..20].copy_from_slice(&(name.len() as u32).to_ne_bytes());
    header[20..24].copy_from_slice(&dirent_type(entry.kind).to_ne_bytes());
    rest[..name.len()].copy_from_slice(name);
    rest[name.len()..].fill(0);
    len
}

/// A decoded record, borrowed from the buffer it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDirent<'a> {
    pub inode: InodeAddr,
    pub offset: u64,
    pub dtype: u32,
    pub name: &'a [u8],
}

/// Iterate the records in a buffer filled by [`write_dirent`].
pub fn parse_dirents(mut buf: &[u8]) -> impl Iterator<Item = RawDirent<'_>> {
    std::iter::from_fn(move || {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let u64_at = |i: usize| u64::from_ne_bytes(buf[i..i + 8].try_into().unwrap_or_default());
        let u32_at = |i: usize| u32::from_ne_bytes(buf[i..i + 4].try_into().unwrap_or_default());
        let namelen = u32_at(16) as usize;
        let total = (HEADER_LEN + namelen).next_multiple_of(ALIGN);
        if total > buf.len() {
            return None;
        }
        let rec = RawDirent {
            inode: u64_at(0),
            offset: u64_at(8),
            dtype: u32_at(20),
            name: &buf[HEADER_LEN..HEADER_LEN + namelen],
        };
        buf = &buf[total..];
        Some(rec)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_padded_to_eight_bytes() {
        let entry = Dirent {
            inode: 2,
            offset: 1,
            name: "a.txt",
            kind: EntryKind::RegularFile,
        };
        assert_eq!(entry.encoded_len(), 32, "24-byte header + 5 bytes, padded");

        let mut buf = [0xffu8; 40];
        assert_eq!(write_dirent(&mut buf, &entry), 32);
        assert_eq!(&buf[24..29], b"a.txt");
        assert_eq!(&buf[29..32], &[0, 0, 0], "padding should be zeroed");
        assert_eq!(buf[32], 0xff, "bytes past the record are untouched");
    }

    #[test]
    fn record_that_does_not_fit_writes_nothing() {
        let entry = Dirent {
            inode: 9,
            offset: 3,
            name: "directory",
            kind: EntryKind::Directory,
        };
        let mut buf = [0u8; 16];
        assert_eq!(write_dirent(&mut buf, &entry), 0);
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn parse_reads_back_header_fields() {
        let mut buf = [0u8; 64];
        let n = write_dirent(
            &mut buf,
            &Dirent {
                inode: 5,
                offset: 7,
                name: "sub",
                kind: EntryKind::Directory,
            },
        );
        let recs: Vec<_> = parse_dirents(&buf[..n]).collect();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].inode, 5);
        assert_eq!(recs[0].offset, 7);
        assert_eq!(recs[0].dtype, u32::from(libc::DT_DIR));
        assert_eq!(recs[0].name, b"sub");
    }

    #[test]
    fn dirent_type_covers_device_kinds() {
        assert_eq!(dirent_type(EntryKind::CharDevice), u32::from(libc::DT_CHR));
        assert_eq!(dirent_type(EntryKind::BlockDevice), u32::from(libc::DT_BLK));
        assert_eq!(dirent_type(EntryKind::NamedPipe), u32::from(libc::DT_FIFO));
    }
}
