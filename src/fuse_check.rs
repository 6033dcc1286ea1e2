//! FUSE availability checks.

#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::path::Path;

#[cfg(target_os = "linux")]
const FUSE_DEVICE: &str = "/dev/fuse";

#[cfg(target_os = "macos")]
const FUSE_BUNDLES: [&str; 2] = [
    "/Library/Filesystems/macfuse.fs",
    "/Library/Filesystems/osxfuse.fs",
];

/// Errors that can occur when verifying FUSE availability.
#[derive(Debug, thiserror::Error)]
pub enum FuseCheckError {
    /// The kernel side of FUSE is missing.
    #[cfg(target_os = "linux")]
    #[error(
        "FUSE device {path} not found. Load the fuse kernel module \
         (`modprobe fuse`) or install your distribution's fuse package."
    )]
    DeviceMissing { path: &'static str },

    /// The FUSE device exists but cannot be opened.
    #[cfg(target_os = "linux")]
    #[error("FUSE device {path} is not accessible: {source}")]
    DeviceInaccessible {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// macFUSE is not installed at all.
    #[cfg(target_os = "macos")]
    #[error(
        "macFUSE is not installed. tree-fs requires macFUSE to mount filesystems.\n\
         Install it from: https://macfuse.github.io/"
    )]
    NotInstalled,
}

/// Verify that FUSE is installed and usable on the current platform.
#[cfg(target_os = "linux")]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    if !Path::new(FUSE_DEVICE).exists() {
        return Err(FuseCheckError::DeviceMissing { path: FUSE_DEVICE });
    }
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(FUSE_DEVICE)
        .map(drop)
        .map_err(|source| FuseCheckError::DeviceInaccessible {
            path: FUSE_DEVICE,
            source,
        })
}

/// Verify that FUSE is installed and usable on the current platform.
#[cfg(target_os = "macos")]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    if FUSE_BUNDLES.iter().any(|bundle| Path::new(bundle).is_dir()) {
        Ok(())
    } else {
        Err(FuseCheckError::NotInstalled)
    }
}

/// Verify that FUSE is installed and usable on the current platform.
///
/// Other platforms are left to the mount call to report.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    Ok(())
}
