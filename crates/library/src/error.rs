//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. None of these escape a run: the
//! pipeline turns every one of them into a failed item in the report.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("library root is not usable: {}", _0.display())]
    Root(#[error(not(source))] PathBuf),
    #[display("failed to scan the library")]
    Scan,
    #[display("failed to read output directory {}", _0.display())]
    OutputState(#[error(not(source))] PathBuf),
    #[display("file index {index} out of range ({len} scanned files)")]
    FileIndex { index: usize, len: usize },
    #[display("not a file name: {}", _0.display())]
    FileName(#[error(not(source))] PathBuf),
    #[display("failed to build the HTTP client: {_0}")]
    Client(#[error(not(source))] String),
    #[display("failed to prepare the NFO template")]
    Nfo,
}
