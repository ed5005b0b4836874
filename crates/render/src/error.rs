//! Render Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Rendering is deterministic, so
//! nothing here is worth retrying.

use derive_more::{Display, Error};

/// A render error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The NFO template failed to compile or render.
    #[display("NFO template error")]
    Template,
    #[display("image is empty")]
    EmptyImage,
    /// Not a JPEG or PNG we can decode.
    #[display("could not decode image")]
    Decode,
    #[display("invalid image dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
    #[display("could not encode JPEG")]
    Encode,
}
