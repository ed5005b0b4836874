//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Callers in the execution engine match
//! on the kind (through `Deref`) to tell "already satisfied" apart from a real
//! conflict, so keep the variants about what happened on disk rather than
//! which syscall failed.

use crate::models::EntryKind;
use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Regular file already exists (for operations that require new files)
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Something other than what the operation needs occupies the path
    #[display("path conflict: {} is a {found}, expected a {expected}", path.display())]
    PathTypeConflict {
        path: PathBuf,
        expected: EntryKind,
        found: EntryKind,
    },
    /// Rename across filesystems; never emulated with copy+delete
    #[display(
        "cross-device move (EXDEV): {} -> {}; source and destination must be on the same filesystem",
        from.display(),
        to.display()
    )]
    CrossDevice { from: PathBuf, to: PathBuf },
    /// Write attempted through a read-only backend
    #[display("refusing to write in read-only mode: {}", _0.display())]
    ReadOnly(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` when the path is occupied by something that is not a
    /// regular file (or, for directories, by something that is not a
    /// directory).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PathTypeConflict { .. })
    }
}
