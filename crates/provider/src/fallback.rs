//! Fetch-then-parse across providers, in a fixed fallback order.
//!
//! Every provider tried leaves exactly one [`Attempt`] in the trace, in the
//! order tried. The first provider whose page both fetches and parses wins.
//! A cancelled token stops the walk: the remaining providers would only
//! fail the same way.

use avmc_extract::{Code, Metadata};
use derive_more::Display;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{Error, ErrorKind};
use crate::http::HttpClient;
use crate::registry::{Registry, normalize};
use crate::{javbus, javdb};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    #[display("fetch")]
    Fetch,
    #[display("parse")]
    Parse,
    #[display("ok")]
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub provider: String,
    pub stage: Stage,
    /// `None` exactly when `stage` is [`Stage::Ok`]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Scraped {
    /// `website` is the page actually fetched
    pub metadata: Metadata,
    pub provider: String,
    pub document: Vec<u8>,
    pub attempts: Vec<Attempt>,
}

/// Why the last provider tried gave up.
#[derive(Debug)]
pub struct Failure {
    pub provider: String,
    pub stage: Stage,
    pub error: Error,
}

/// Every provider failed.
#[derive(Debug)]
pub struct Exhausted {
    pub last: Failure,
    pub attempts: Vec<Attempt>,
}
impl Exhausted {
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.last.error, ErrorKind::Cancelled)
    }
}

/// Providers to try, in order, for a requested provider name.
pub fn fallback_order(requested: &str) -> Option<[&'static str; 2]> {
    match normalize(requested).as_str() {
        javbus::NAME => Some([javbus::NAME, javdb::NAME]),
        javdb::NAME => Some([javdb::NAME, javbus::NAME]),
        _ => None,
    }
}

#[instrument(skip(registry, http, cancel), fields(code = %code))]
pub async fn scrape(
    registry: &Registry,
    requested: &str,
    code: &Code,
    http: &HttpClient,
    cancel: &CancellationToken,
) -> Result<Scraped, Exhausted> {
    let Some(order) = fallback_order(requested) else {
        return Err(Exhausted {
            last: Failure {
                provider: normalize(requested),
                stage: Stage::Fetch,
                error: ErrorKind::UnknownProvider(requested.to_string()).into(),
            },
            attempts: Vec::new(),
        });
    };

    let mut attempts = Vec::with_capacity(order.len());
    let mut last = None;
    for name in order {
        let failure = match try_provider(registry, name, code, http, cancel).await {
            Ok((metadata, fetched)) => {
                attempts.push(Attempt {
                    provider: name.to_string(),
                    stage: Stage::Ok,
                    error: None,
                });
                tracing::debug!(provider = name, "Scraped");
                return Ok(Scraped {
                    metadata,
                    provider: name.to_string(),
                    document: fetched.document,
                    attempts,
                });
            },
            Err(failure) => failure,
        };
        let message = (*failure.error).to_string();
        tracing::debug!(provider = name, stage = %failure.stage, error = %message, "Provider failed");
        attempts.push(Attempt {
            provider: failure.provider.clone(),
            stage: failure.stage,
            error: Some(message),
        });
        let cancelled = matches!(&*failure.error, ErrorKind::Cancelled);
        last = Some(failure);
        if cancelled {
            break;
        }
    }
    // `order` is never empty, so `last` is always set here.
    let last = last.unwrap_or_else(|| Failure {
        provider: normalize(requested),
        stage: Stage::Fetch,
        error: ErrorKind::UnknownProvider(requested.to_string()).into(),
    });
    Err(Exhausted { last, attempts })
}

async fn try_provider(
    registry: &Registry,
    name: &str,
    code: &Code,
    http: &HttpClient,
    cancel: &CancellationToken,
) -> Result<(Metadata, crate::Fetched), Failure> {
    let failure = |stage: Stage, error: Error| Failure {
        provider: name.to_string(),
        stage,
        error,
    };
    let provider = registry
        .get(name)
        .ok_or_else(|| failure(Stage::Fetch, ErrorKind::Unregistered(name.to_string()).into()))?;
    let fetched = provider
        .fetch(code, http, cancel)
        .await
        .map_err(|err| failure(Stage::Fetch, err))?;
    let mut metadata = provider
        .parse(code, &fetched.document, &fetched.page_url)
        .map_err(|err| failure(Stage::Parse, err))?;
    metadata.website = fetched.page_url.clone();
    Ok((metadata, fetched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::{Fetched, Provider};
    use async_trait::async_trait;
    use rstest::rstest;

    /// Serves a fixed outcome without touching the network.
    struct Canned {
        name: &'static str,
        fetch: std::result::Result<&'static str, ErrorKind>,
        title: Option<&'static str>,
    }

    #[async_trait]
    impl Provider for Canned {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _: &Code, _: &HttpClient, _: &CancellationToken) -> Result<Fetched> {
            match &self.fetch {
                Ok(url) => Ok(Fetched {
                    document: b"<html></html>".to_vec(),
                    page_url: url.to_string(),
                }),
                Err(kind) => Err(kind.clone().into()),
            }
        }

        fn parse(&self, code: &Code, _: &[u8], _: &str) -> Result<Metadata> {
            let Some(title) = self.title else {
                exn::bail!(ErrorKind::Parse(avmc_extract::error::ErrorKind::MissingField("title")));
            };
            let mut meta = Metadata::new(code.clone());
            meta.title = title.to_string();
            meta.website = "overwritten".to_string();
            Ok(meta)
        }
    }

    fn registry(providers: Vec<Canned>) -> Registry {
        let mut registry = Registry::default();
        for provider in providers {
            registry.register(provider).unwrap();
        }
        registry
    }

    async fn run(registry: &Registry, requested: &str) -> std::result::Result<Scraped, Exhausted> {
        let http = HttpClient::meta(None).unwrap();
        scrape(registry, requested, &Code::parse("ABC-123").unwrap(), &http, &CancellationToken::new()).await
    }

    fn ok(name: &'static str) -> Canned {
        Canned {
            name,
            fetch: Ok("https://example.com/ABC-123"),
            title: Some("Title"),
        }
    }

    #[rstest]
    #[case("javbus", Some(["javbus", "javdb"]))]
    #[case(" JavDB", Some(["javdb", "javbus"]))]
    #[case("r18", None)]
    fn test_fallback_order(#[case] requested: &str, #[case] expected: Option<[&str; 2]>) {
        assert_eq!(fallback_order(requested), expected);
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let registry = registry(vec![ok("javbus"), ok("javdb")]);
        let scraped = run(&registry, "javbus").await.unwrap();
        assert_eq!(scraped.provider, "javbus");
        assert_eq!(scraped.metadata.website, "https://example.com/ABC-123");
        assert_eq!(
            scraped.attempts,
            vec![Attempt {
                provider: "javbus".to_string(),
                stage: Stage::Ok,
                error: None
            }]
        );
    }

    #[tokio::test]
    async fn test_falls_back_after_fetch_failure() {
        let blocked = Canned {
            name: "javbus",
            fetch: Err(ErrorKind::Blocked {
                url: "https://www.javbus.com/doc/driver-verify".to_string(),
                reason: "driver-verify".to_string(),
            }),
            title: None,
        };
        let registry = registry(vec![blocked, ok("javdb")]);
        let scraped = run(&registry, "javbus").await.unwrap();
        assert_eq!(scraped.provider, "javdb");
        let stages: Vec<_> = scraped.attempts.iter().map(|a| (a.provider.as_str(), a.stage)).collect();
        assert_eq!(stages, vec![("javbus", Stage::Fetch), ("javdb", Stage::Ok)]);
        assert_eq!(scraped.attempts[0].error.as_deref(), Some("blocked: driver-verify"));
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_failure() {
        let unparsable = Canned {
            name: "javdb",
            fetch: Ok("https://javdb.com/v/abc12"),
            title: None,
        };
        // javbus is not registered at all.
        let registry = registry(vec![unparsable]);
        let exhausted = run(&registry, "javdb").await.unwrap_err();
        assert_eq!(exhausted.last.provider, "javbus");
        assert_eq!(exhausted.last.stage, Stage::Fetch);
        assert!(matches!(&*exhausted.last.error, ErrorKind::Unregistered(_)));
        let stages: Vec<_> = exhausted.attempts.iter().map(|a| (a.provider.as_str(), a.stage)).collect();
        assert_eq!(stages, vec![("javdb", Stage::Parse), ("javbus", Stage::Fetch)]);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let registry = registry(vec![ok("javbus"), ok("javdb")]);
        let exhausted = run(&registry, "r18").await.unwrap_err();
        assert!(matches!(&*exhausted.last.error, ErrorKind::UnknownProvider(_)));
        assert!(exhausted.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_fallback() {
        let cancelled = Canned {
            name: "javbus",
            fetch: Err(ErrorKind::Cancelled),
            title: None,
        };
        let registry = registry(vec![cancelled, ok("javdb")]);
        let exhausted = run(&registry, "javbus").await.unwrap_err();
        assert!(exhausted.is_cancelled());
        assert_eq!(exhausted.attempts.len(), 1);
    }
}
