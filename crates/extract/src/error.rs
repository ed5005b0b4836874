//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every parse failure here means the
//! document isn't the detail page we asked for, so nothing is retryable.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not of the form `LETTERS-DIGITS`.
    #[display("invalid code: {_0:?}")]
    InvalidCode(#[error(not(source))] String),
    /// Nothing to parse.
    #[display("empty document")]
    EmptyDocument,
    /// A required field could not be found in the document; usually a
    /// verification page or some other non-detail page.
    #[display("missing required field: {_0} (verification page or not a detail page?)")]
    MissingField(#[error(not(source))] &'static str),
    /// The page describes a different title than the one requested.
    #[display("code mismatch: expected {expected}, page shows {found}")]
    CodeMismatch {
        /// The code that was requested.
        expected: String,
        /// The code printed on the page.
        found: String,
    },
}
