//! Provider Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The variants carry exactly what is
//! needed to explain a failed scrape to a human, see
//! [`humanize`](crate::humanize).

use derive_more::{Display, Error};

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested provider has no fallback order.
    #[display("unknown provider: {_0:?}")]
    UnknownProvider(#[error(not(source))] String),
    /// Part of the fallback order but missing from the registry.
    #[display("provider not registered: {_0:?}")]
    Unregistered(#[error(not(source))] String),
    /// Registry misuse: empty or duplicate provider name.
    #[display("invalid provider registration: {_0:?}")]
    Registration(#[error(not(source))] String),
    /// The site answered with a verification or interstitial page.
    #[display("blocked: {reason}")]
    Blocked { url: String, reason: String },
    /// Unexpected status code.
    #[display("HTTP {status}{}", location.as_deref().map(|l| format!(" location={l}")).unwrap_or_default())]
    HttpStatus {
        url: String,
        status: u16,
        location: Option<String>,
    },
    #[display("request timed out")]
    Timeout,
    #[display("TLS handshake failed")]
    Tls,
    /// Any other transport failure (DNS, connection refused, reset, ...).
    #[display("request failed: {_0}")]
    Request(#[error(not(source))] String),
    #[display("invalid URL: {_0:?}")]
    InvalidUrl(#[error(not(source))] String),
    #[display("empty response body")]
    EmptyBody,
    /// The search page has no result whose title is the code.
    #[display("no search result for {_0}")]
    NoSearchResult(#[error(not(source))] String),
    #[display("cancelled")]
    Cancelled,
    /// The HTTP client could not be constructed (bad proxy, TLS backend).
    #[display("failed to build HTTP client: {_0}")]
    Client(#[error(not(source))] String),
    /// The document was fetched but isn't the detail page we expected.
    #[display("parse error: {_0}")]
    Parse(avmc_extract::error::ErrorKind),
}
