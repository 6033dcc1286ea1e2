//! Capability-ranked reads.
//!
//! Objects opened from a tree expose different subsets of positioned reads,
//! seeking, and bulk reads. The cheapest available one is picked on every
//! call, in this order: positioned read, seek then sequential read, whole-file
//! read from the tree, and finally a fresh sequential read that discards
//! everything before the offset. Every strategy fills the destination until it is
//! full or the data runs out; running out is a short read, never an error.

use std::io;

use tracing::trace;

use super::handle_table::OpenHandle;
use super::tree::{FileTree, TreeFile};

/// Fill `dst` from `read` until it is full or `read` reports end of data.
fn fill(dst: &mut [u8], mut read: impl FnMut(&mut [u8]) -> io::Result<usize>) -> io::Result<usize> {
    let mut filled = 0;
    while filled < dst.len() {
        match read(&mut dst[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Adapts a [`TreeFile`]'s sequential reads to [`io::Read`].
struct SeqReader<'a, F>(&'a F);

impl<F: TreeFile> io::Read for SeqReader<'_, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Read into `dst` from byte `offset` of the object behind `handle`.
///
/// Returns the number of bytes written to `dst`.
pub fn read_handle<T: FileTree>(
    tree: &T,
    handle: &OpenHandle<T::File>,
    offset: u64,
    dst: &mut [u8],
) -> io::Result<usize> {
    let file = handle.file();

    if let Some(ra) = file.as_read_at() {
        trace!(offset, len = dst.len(), path = handle.path(), "positioned read");
        let mut pos = offset;
        fill(dst, |buf| {
            let n = ra.read_at(buf, pos)?;
            pos += n as u64;
            Ok(n)
        })
    } else if let Some(seeker) = file.as_seekable() {
        trace!(offset, len = dst.len(), path = handle.path(), "seek then read");
        let _cursor = handle.lock_cursor();
        seeker.seek(offset)?;
        fill(dst, |buf| file.read(buf))
    } else if let Some(bulk) = tree.as_whole_file_reader() {
        trace!(offset, len = dst.len(), path = handle.path(), "whole-file read");
        let data = bulk.read_whole_file(handle.path())?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = dst.len().min(data.len() - start);
        dst[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    } else {
        trace!(offset, len = dst.len(), path = handle.path(), "discard then read");
        let fresh = tree.open(handle.path())?;
        let result = discard_then_read(&fresh, offset, dst);
        if let Err(e) = fresh.close() {
            trace!(path = handle.path(), error = %e, "transient close failed");
        }
        result
    }
}

fn discard_then_read<F: TreeFile>(file: &F, offset: u64, dst: &mut [u8]) -> io::Result<usize> {
    use std::io::Read as _;

    if offset != 0 {
        let skipped = io::copy(&mut SeqReader(file).take(offset), &mut io::sink())?;
        if skipped < offset {
            return Ok(0);
        }
    }
    fill(dst, |buf| file.read(buf))
}
