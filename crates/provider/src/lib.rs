//! Metadata providers and the fallback scrape protocol.
//!
//! A [`Provider`] knows how to fetch the detail page for a code and how to
//! parse it. Providers are looked up by name in a [`Registry`], and
//! [`fallback::scrape()`] tries them in a fixed order, keeping a trace of
//! every attempt.

pub mod download;
pub mod error;
pub mod fallback;
pub mod http;
mod humanize;
pub mod javbus;
pub mod javdb;
mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::fallback::{Attempt, Exhausted, Failure, Scraped, Stage, scrape};
pub use crate::http::HttpClient;
pub use crate::humanize::humanize;
pub use crate::registry::Registry;

use async_trait::async_trait;
use avmc_extract::{Code, Metadata};
use exn::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};

/// The raw detail page and the URL it was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub document: Vec<u8>,
    pub page_url: String,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Lowercase registry name, also used as the cache directory name.
    fn name(&self) -> &str;

    /// Download the detail page for `code`.
    async fn fetch(&self, code: &Code, http: &HttpClient, cancel: &CancellationToken) -> Result<Fetched>;

    /// Turn a detail page into metadata. Pure: no I/O.
    fn parse(&self, code: &Code, document: &[u8], page_url: &str) -> Result<Metadata>;
}

/// Re-raise an extraction error as [`ErrorKind::Parse`], keeping the
/// original as the child frame.
pub(crate) fn raise_parse<T>(err: avmc_extract::error::Error) -> Result<T> {
    let kind = ErrorKind::Parse((*err).clone());
    Err(err).or_raise(|| kind)
}

/// Registry holding the built-in providers.
pub fn builtin(javdb_base_url: &str) -> Result<Registry> {
    let mut registry = Registry::default();
    registry.register(javbus::Javbus::default())?;
    registry.register(javdb::Javdb::with_base_url(javdb_base_url))?;
    Ok(registry)
}
