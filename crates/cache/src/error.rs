//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Storage failures are raised as
//! [`ErrorKind::Storage`] with the storage error kept as the child frame.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Writes were attempted on a cache opened read-only (dry-run).
    #[display("cache is read-only")]
    ReadOnly,
    /// Provider names become directory names, so they are restricted.
    #[display("invalid provider name for cache: {_0:?}")]
    InvalidProvider(#[error(not(source))] String),
    /// Reading or writing the underlying file failed.
    #[display("cache storage error")]
    Storage,
    /// Serialization/deserialization error.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
