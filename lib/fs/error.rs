use thiserror::Error;

use super::FileHandle;

/// Errors surfaced by [`TreeFs`](super::TreeFs) operations.
#[derive(Debug, Error)]
pub enum TreeFsError {
    #[error("no such entry: {path:?}")]
    NotFound { path: String },

    #[error("handle {0} is not open")]
    InvalidHandle(FileHandle),

    #[error("io error on {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TreeFsError {
    /// Classify an error returned by the tree for `path`.
    pub(crate) fn from_tree(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_owned(),
            }
        } else {
            Self::Io {
                path: path.to_owned(),
                source,
            }
        }
    }

    /// Wrap an error as an I/O failure regardless of its kind.
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<TreeFsError> for i32 {
    fn from(e: TreeFsError) -> Self {
        match e {
            TreeFsError::NotFound { .. } => libc::ENOENT,
            TreeFsError::InvalidHandle(_) => libc::EINVAL,
            TreeFsError::Io { .. } => libc::EIO,
        }
    }
}
