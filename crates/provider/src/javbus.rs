use async_trait::async_trait;
use avmc_extract::{Code, Metadata};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};
use crate::http::{GetOptions, HttpClient, Page};
use crate::{Fetched, Provider, raise_parse};

pub const NAME: &str = "javbus";
pub const BASE_URL: &str = "https://www.javbus.com";

const DRIVER_VERIFY: &str = "/doc/driver-verify";

/// JavBus: one request to `<base>/<CODE>`, redirects not followed.
#[derive(Debug, Clone)]
pub struct Javbus {
    base_url: String,
}
impl Default for Javbus {
    fn default() -> Self {
        Self::with_base_url(BASE_URL)
    }
}
impl Javbus {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Provider for Javbus {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, code: &Code, http: &HttpClient, cancel: &CancellationToken) -> Result<Fetched> {
        let page_url = format!("{}/{code}", self.base_url);
        let page = http.get(&page_url, &GetOptions::no_follow(), cancel).await?;
        let document = check_page(&page_url, page)?;
        Ok(Fetched { document, page_url })
    }

    fn parse(&self, code: &Code, document: &[u8], page_url: &str) -> Result<Metadata> {
        avmc_extract::javbus::parse(code, document, page_url).or_else(raise_parse)
    }
}

/// A redirect is only an error when it leads to the age/driver verification
/// page; any other 3xx body is handed to the parser as is.
fn check_page(page_url: &str, page: Page) -> Result<Vec<u8>> {
    if page.final_url.path().contains(DRIVER_VERIFY) {
        exn::bail!(ErrorKind::Blocked {
            url: page.final_url.to_string(),
            reason: "driver-verify".to_string(),
        });
    }
    if page.is_redirect()
        && let Some(location) = page.location.as_deref().filter(|l| l.contains(DRIVER_VERIFY))
        && (contains(&page.body, br#"id="ageVerify""#) || contains(&page.body, DRIVER_VERIFY.as_bytes()))
    {
        exn::bail!(ErrorKind::Blocked {
            url: location.to_string(),
            reason: "driver-verify".to_string(),
        });
    }
    if !(200..400).contains(&page.status) {
        exn::bail!(ErrorKind::HttpStatus {
            url: page_url.to_string(),
            status: page.status,
            location: page.location,
        });
    }
    if page.body.is_empty() {
        exn::bail!(ErrorKind::EmptyBody);
    }
    Ok(page.body)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
