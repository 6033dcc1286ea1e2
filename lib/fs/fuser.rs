//! FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`TreeFs`].
//!
//! fuser calls in on a single session thread. Every request that may touch
//! the tree is handed to the tokio blocking pool, which is the worker pool
//! that lets independent requests proceed concurrently. Forgets only touch
//! the inode table and are handled inline.

use std::ffi::OsStr;
use std::sync::Arc;

use tracing::{debug, error, instrument};

use super::error::TreeFsError;
use super::inode_table::ForgetEntry;
use super::tree::FileTree;
use super::tree_fs::TreeFs;

/// Trait abstracting the `.error(errno)` method common to all fuser reply types.
trait FuseReply {
    fn error(self, errno: i32);
}

macro_rules! impl_fuse_reply {
    ($($ty:ty),* $(,)?) => {
        $(impl FuseReply for $ty {
            fn error(self, errno: i32) {
                // Calls the inherent fuser method (not this trait method).
                self.error(errno);
            }
        })*
    };
}

impl_fuse_reply!(
    fuser::ReplyEntry,
    fuser::ReplyAttr,
    fuser::ReplyDirectory,
    fuser::ReplyOpen,
    fuser::ReplyData,
    fuser::ReplyEmpty,
);

/// Extension trait on `Result<T, TreeFsError>` for FUSE reply handling.
///
/// Centralizes the error-logging + errno-reply path so each FUSE callback
/// only has to express its success path.
trait FuseResultExt<T> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R));
}

impl<T> FuseResultExt<T> for Result<T, TreeFsError> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R)) {
        match self {
            Ok(val) => on_ok(val, reply),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(e.into());
            }
        }
    }
}

/// Names the tree cannot represent do not exist in it.
fn utf8_name(name: &OsStr) -> Result<String, TreeFsError> {
    name.to_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| TreeFsError::NotFound {
            path: name.to_string_lossy().into_owned(),
        })
}

/// Bridges a [`TreeFs`] to the [`fuser::Filesystem`] trait.
pub struct FuserAdapter<T: FileTree> {
    fs: Arc<TreeFs<T>>,
    runtime: tokio::runtime::Handle,
}

impl<T: FileTree> FuserAdapter<T> {
    pub fn new(fs: TreeFs<T>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            fs: Arc::new(fs),
            runtime,
        }
    }

    /// Run `op` on the blocking pool with a handle to the session.
    fn dispatch(&self, op: impl FnOnce(&TreeFs<T>) + Send + 'static) {
        let fs = Arc::clone(&self.fs);
        drop(self.runtime.spawn_blocking(move || op(&fs)));
    }
}

impl<T: FileTree> fuser::Filesystem for FuserAdapter<T> {
    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        let name = utf8_name(name);
        self.dispatch(move |fs| {
            name.and_then(|name| fs.lookup(parent, &name))
                .fuse_reply(reply, |entry, reply| {
                    let attr = entry.attributes.to_fuser(entry.inode);
                    debug!(?attr, generation = entry.generation, "replying...");
                    reply.entry(&fs.mapper().kernel_ttl(), &attr, entry.generation);
                });
        });
    }

    #[instrument(name = "FuserAdapter::forget", skip(self, _req))]
    fn forget(&mut self, _req: &fuser::Request<'_>, ino: u64, nlookup: u64) {
        if let Err(e) = self.fs.forget(ino, nlookup) {
            error!(error = %e, "forget failed");
        }
    }

    #[instrument(name = "FuserAdapter::batch_forget", skip_all, fields(count = nodes.len()))]
    fn batch_forget(&mut self, _req: &fuser::Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        let entries = nodes.iter().map(|node| ForgetEntry {
            inode: node.nodeid,
            nlookup: node.nlookup,
        });
        if let Err(e) = self.fs.batch_forget(entries) {
            error!(error = %e, "batch forget failed");
        }
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        self.dispatch(move |fs| {
            fs.get_attributes(ino).fuse_reply(reply, |attrs, reply| {
                let attr = attrs.to_fuser(ino);
                debug!(?attr, "replying...");
                reply.attr(&fs.mapper().kernel_ttl(), &attr);
            });
        });
    }

    #[instrument(name = "FuserAdapter::opendir", skip(self, _req, _flags, reply))]
    fn opendir(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        self.dispatch(move |fs| {
            fs.open_directory(ino).fuse_reply(reply, |fh, reply| {
                debug!(handle = fh, "replying...");
                reply.opened(fh, 0);
            });
        });
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        reply: fuser::ReplyDirectory,
    ) {
        self.dispatch(move |fs| {
            fs.directory_entries(ino, fh, offset.cast_unsigned())
                .fuse_reply(reply, |entries, mut reply| {
                    for entry in entries {
                        let Ok(next): Result<i64, _> = entry.offset.try_into() else {
                            error!("Directory entry offset {} too large for fuser", entry.offset);
                            reply.error(libc::EIO);
                            return;
                        };
                        if reply.add(entry.inode, next, entry.kind.into(), &entry.name) {
                            debug!("buffer full for now, stopping readdir");
                            break;
                        }
                    }
                    debug!("finalizing reply...");
                    reply.ok();
                });
        });
    }

    #[instrument(name = "FuserAdapter::releasedir", skip(self, _req, _ino, _flags, reply))]
    fn releasedir(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: fuser::ReplyEmpty,
    ) {
        self.dispatch(move |fs| {
            fs.release_directory_handle(fh);
            reply.ok();
        });
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, _flags, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        self.dispatch(move |fs| {
            fs.open_file(ino).fuse_reply(reply, |opened, reply| {
                let flags = if opened.keep_page_cache {
                    fuser::consts::FOPEN_KEEP_CACHE
                } else {
                    0
                };
                debug!(handle = opened.handle, flags, "replying...");
                reply.opened(opened.handle, flags);
            });
        });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        self.dispatch(move |fs| {
            let mut buf = vec![0u8; size as usize];
            fs.read_file(fh, ino, offset.cast_unsigned(), &mut buf)
                .fuse_reply(reply, |n, reply| {
                    debug!(read_bytes = n, "replying...");
                    reply.data(&buf[..n]);
                });
        });
    }

    #[instrument(name = "FuserAdapter::flush", skip(self, _req, _ino, _lock_owner, reply))]
    fn flush(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: fuser::ReplyEmpty,
    ) {
        self.fs
            .flush(fh)
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _ino, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        self.dispatch(move |fs| {
            fs.release_file_handle(fh);
            debug!("replying ok");
            reply.ok();
        });
    }
}
