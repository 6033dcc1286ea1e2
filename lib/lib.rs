//! tree-fs shared library.

/// Read-only tree adapter and its FUSE transport.
pub mod fs;
