//! Per-run HTTP transport.
//!
//! Every request gets a User-Agent picked at random from a small pool of
//! desktop browsers. Transport failures on GET are retried a bounded number
//! of times; HTTP status codes are never retried and are left for the caller
//! to judge. All requests race a [`CancellationToken`].

use std::time::Duration;

use exn::ResultExt;
use rand::seq::IndexedRandom;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, header};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ErrorKind, Result};

const TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: usize = 2;
const MAX_REDIRECTS: usize = 10;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::rng()).copied().unwrap_or(USER_AGENTS[0])
}

/// Per-request knobs.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Follow 3xx responses; otherwise the redirect itself is returned.
    pub follow_redirects: bool,
    pub referer: Option<String>,
    pub cookie: Option<String>,
}
impl GetOptions {
    pub fn follow() -> Self {
        Self {
            follow_redirects: true,
            ..Self::default()
        }
    }

    pub fn no_follow() -> Self {
        Self::default()
    }
}

/// A fully read response of any status.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    /// Trimmed `Location` header, when present and non-empty
    pub location: Option<String>,
    /// URL after redirects
    pub final_url: Url,
    pub body: Vec<u8>,
}
impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    follow: Client,
    no_follow: Client,
}
impl HttpClient {
    /// Client for metadata pages, routed through `proxy` when given.
    pub fn meta(proxy: Option<&Url>) -> Result<Self> {
        Self::build(proxy)
    }

    /// Client for image downloads. Images connect directly unless
    /// `image_proxy` is set, in which case `proxy` is required.
    pub fn image(proxy: Option<&Url>, image_proxy: bool) -> Result<Self> {
        match (image_proxy, proxy) {
            (false, _) => Self::build(None),
            (true, Some(proxy)) => Self::build(Some(proxy)),
            (true, None) => exn::bail!(ErrorKind::Client("image_proxy is enabled but no proxy is configured".to_string())),
        }
    }

    fn build(proxy: Option<&Url>) -> Result<Self> {
        Ok(Self {
            follow: client(proxy, Policy::limited(MAX_REDIRECTS))?,
            no_follow: client(proxy, Policy::none())?,
        })
    }

    /// GET `url`, reading the whole body. Any status is returned as a
    /// [`Page`]; only transport failures are errors.
    #[tracing::instrument(skip(self, opts, cancel))]
    pub async fn get(&self, url: &str, opts: &GetOptions, cancel: &CancellationToken) -> Result<Page> {
        let parsed = Url::parse(url).or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        let client = match opts.follow_redirects {
            true => &self.follow,
            false => &self.no_follow,
        };
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            let mut request = client
                .get(parsed.clone())
                .header(header::USER_AGENT, random_user_agent());
            if let Some(referer) = &opts.referer {
                request = request.header(header::REFERER, referer);
            }
            if let Some(cookie) = &opts.cookie {
                request = request.header(header::COOKIE, cookie);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
                result = send(request) => result,
            };
            match result {
                Ok(page) => {
                    tracing::debug!(status = page.status, bytes = page.body.len(), "Fetched");
                    return Ok(page);
                },
                Err(err) if attempt < MAX_RETRIES && !cancel.is_cancelled() => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %err, "Transport error, retrying");
                },
                Err(err) => {
                    let kind = classify(&err);
                    return Err(err).or_raise(|| kind);
                },
            }
        }
    }
}

fn client(proxy: Option<&Url>, redirects: Policy) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(redirects);
    builder = match proxy {
        // Rotating proxy pools hand out a new exit per connection.
        Some(proxy) => builder
            .proxy(reqwest::Proxy::all(proxy.as_str()).or_raise(|| ErrorKind::Client(format!("proxy {proxy}")))?)
            .pool_max_idle_per_host(0),
        None => builder.no_proxy(),
    };
    builder.build().or_raise(|| ErrorKind::Client("reqwest".to_string()))
}

async fn send(request: RequestBuilder) -> std::result::Result<Page, reqwest::Error> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let final_url = response.url().clone();
    let body = response.bytes().await?.to_vec();
    Ok(Page {
        status,
        location,
        final_url,
        body,
    })
}

fn classify(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        return ErrorKind::Timeout;
    }
    let mut chain = Vec::new();
    let mut source: Option<&dyn std::error::Error> = Some(err);
    while let Some(current) = source {
        chain.push(current.to_string().to_lowercase());
        source = current.source();
    }
    let chain = chain.join(": ");
    if ["tls", "ssl", "handshake", "certificate"].iter().any(|needle| chain.contains(needle)) {
        return ErrorKind::Tls;
    }
    if chain.contains("timed out") || chain.contains("timeout") {
        return ErrorKind::Timeout;
    }
    ErrorKind::Request(chain)
}
