//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each kind maps onto one of the
//! stable `config_*` codes that end up in the run report.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No path given on the command line and no config file in the working
    /// directory.
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Unreadable, unparsable, or fails validation.
    #[display("invalid config {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    /// The config file is the only source of the library path and lacks one.
    #[display("config file {} is missing the required field `path`", _0.display())]
    MissingPath(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Stable error code, as reported in `error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "config_not_found",
            Self::Invalid { .. } => "config_invalid",
            Self::MissingPath(_) => "config_missing_path",
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
