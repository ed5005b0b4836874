//! The provider fallback protocol behind the structured-cache gate.

use avmc_cache::{ProviderCache, normalize_provider};
use avmc_extract::{Code, Metadata};
use avmc_provider::{Attempt, Exhausted, HttpClient, Registry, Scraped};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrape {
    pub metadata: Metadata,
    /// The provider whose page was used, or the requested one on a cache hit
    pub provider: String,
    /// Empty on a cache hit
    pub attempts: Vec<Attempt>,
}

/// Metadata for `code`, from the cache when the requested provider has a
/// usable entry, otherwise from the providers in fallback order.
///
/// A cache entry that doesn't decode counts as a miss. A fresh scrape is
/// written back (page and metadata, under the provider that answered) unless
/// the cache is read-only; failing to write it back never fails the scrape.
#[instrument(skip(cache, registry, http, cancel), fields(code = %code))]
pub async fn scrape(
    cache: &ProviderCache,
    registry: &Registry,
    requested: &str,
    code: &Code,
    http: &HttpClient,
    cancel: &CancellationToken,
) -> Result<Scrape, Exhausted> {
    if let Some(scrape) = cached(cache, requested, code).await {
        return Ok(scrape);
    }

    let Scraped {
        metadata,
        provider,
        document,
        attempts,
        ..
    } = avmc_provider::scrape(registry, requested, code, http, cancel).await?;

    if !cache.is_read_only() {
        if let Err(err) = cache.write_document(&provider, code, &document).await {
            tracing::warn!(provider = %provider, error = %*err, "Failed to cache page");
        }
        if let Err(err) = cache.write_metadata(&provider, &metadata).await {
            tracing::warn!(provider = %provider, error = %*err, "Failed to cache metadata");
        }
    }
    Ok(Scrape {
        metadata,
        provider,
        attempts,
    })
}

async fn cached(cache: &ProviderCache, requested: &str, code: &Code) -> Option<Scrape> {
    let provider = normalize_provider(requested).ok()?;
    match cache.read_metadata(&provider, code).await {
        Ok(Some(metadata)) => {
            tracing::debug!(provider = %provider, "Cache hit");
            Some(Scrape {
                metadata,
                provider,
                attempts: Vec::new(),
            })
        },
        Ok(None) => None,
        Err(err) => {
            tracing::debug!(provider = %provider, error = %*err, "Unusable cache entry; scraping again");
            None
        },
    }
}
