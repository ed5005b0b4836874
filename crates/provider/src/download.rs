//! Image downloads.

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ErrorKind, Result};
use crate::http::{GetOptions, HttpClient};

/// JavBus serves images only to requests that look like they came from a
/// detail page of an age-verified visitor.
fn needs_javbus_headers(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
        .is_some_and(|host| host == "javbus.com" || host.ends_with(".javbus.com"))
}

/// Download `url`, requiring a 2xx answer. `referer` is the detail page the
/// image was found on.
#[tracing::instrument(skip(http, cancel))]
pub async fn download(http: &HttpClient, url: &str, referer: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let mut opts = GetOptions::follow();
    if needs_javbus_headers(url) {
        opts.referer = Some(referer.trim().to_string()).filter(|r| !r.is_empty());
        opts.cookie = Some("age=verified".to_string());
    }
    let page = http.get(url, &opts, cancel).await?;
    if !page.is_success() {
        exn::bail!(ErrorKind::HttpStatus {
            url: url.to_string(),
            status: page.status,
            location: page.location,
        });
    }
    tracing::debug!(bytes = page.body.len(), "Downloaded");
    Ok(page.body)
}
