use async_trait::async_trait;
use avmc_extract::{Code, Metadata};
use exn::{OptionExt, ResultExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ErrorKind, Result};
use crate::http::{GetOptions, HttpClient};
use crate::{Fetched, Provider, raise_parse};

pub const NAME: &str = "javdb";
pub const BASE_URL: &str = "https://javdb.com";

/// JavDB: detail URLs are opaque, so search first, then follow the result
/// whose title is the code.
#[derive(Debug, Clone)]
pub struct Javdb {
    base_url: String,
}
impl Default for Javdb {
    fn default() -> Self {
        Self::with_base_url(BASE_URL)
    }
}
impl Javdb {
    /// Mirrors are common; an empty base falls back to [`BASE_URL`].
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = match base_url.trim().trim_end_matches('/') {
            "" => BASE_URL.to_string(),
            trimmed => trimmed.to_string(),
        };
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, code: &Code) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/search", self.base_url)).or_raise(|| ErrorKind::InvalidUrl(self.base_url.clone()))?;
        url.query_pairs_mut().append_pair("q", code.as_str()).append_pair("f", "all");
        Ok(url)
    }

    async fn get_ok(&self, url: &str, http: &HttpClient, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let page = http.get(url, &GetOptions::follow(), cancel).await?;
        if !page.is_success() {
            exn::bail!(ErrorKind::HttpStatus {
                url: url.to_string(),
                status: page.status,
                location: page.location,
            });
        }
        if page.body.is_empty() {
            exn::bail!(ErrorKind::EmptyBody);
        }
        Ok(page.body)
    }
}

#[async_trait]
impl Provider for Javdb {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, code: &Code, http: &HttpClient, cancel: &CancellationToken) -> Result<Fetched> {
        let search_url = self.search_url(code)?;
        let results = self.get_ok(search_url.as_str(), http, cancel).await?;
        let href = avmc_extract::javdb::search_result_href(code, &results)
            .ok_or_raise(|| ErrorKind::NoSearchResult(code.to_string()))?;
        let page_url = search_url
            .join(&href)
            .or_raise(|| ErrorKind::InvalidUrl(href.clone()))?
            .to_string();
        tracing::debug!(code = %code, page_url = %page_url, "Search result found");
        let document = self.get_ok(&page_url, http, cancel).await?;
        Ok(Fetched { document, page_url })
    }

    fn parse(&self, code: &Code, document: &[u8], page_url: &str) -> Result<Metadata> {
        avmc_extract::javdb::parse(code, document, page_url).or_else(raise_parse)
    }
}
