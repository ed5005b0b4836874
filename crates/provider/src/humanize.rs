use crate::error::ErrorKind;
use crate::fallback::{Failure, Stage};
use crate::javdb;

const PROXY_HINT: &str = "set proxy.url to a proxy pool or try the other provider";

/// One-line explanation of a failed scrape, with a hint where there is one.
pub fn humanize(failure: &Failure) -> String {
    let provider = failure.provider.as_str();
    let kind = &*failure.error;
    match failure.stage {
        Stage::Parse => format!("{provider} parse failed (the page structure may have changed, or this is not a detail page): {kind}"),
        Stage::Fetch | Stage::Ok => humanize_fetch(provider, kind),
    }
}

fn humanize_fetch(provider: &str, kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::Blocked { reason, .. } if reason == "driver-verify" => {
            format!("{provider} redirected to its verification page (driver-verify), which is not bypassed; {PROXY_HINT}")
        },
        ErrorKind::Blocked { reason, .. } => format!("{provider} blocked the request ({reason}); {PROXY_HINT}"),
        ErrorKind::HttpStatus {
            status,
            location: Some(location),
            ..
        } if (300..400).contains(status) && location.contains("driver-verify") => {
            format!("{provider} redirected to its verification page (driver-verify), which is not bypassed; {PROXY_HINT}")
        },
        ErrorKind::HttpStatus { status: status @ (403 | 429), .. } => format!(
            "{provider} returned HTTP {status} (possibly rate-limited or anti-bot); lower concurrency or set proxy.url"
        ),
        ErrorKind::HttpStatus { status: 404, .. } => {
            format!("{provider} returned HTTP 404 (the code may not exist or was taken down)")
        },
        ErrorKind::HttpStatus {
            status,
            location: Some(location),
            ..
        } if (300..400).contains(status) => format!("{provider} returned HTTP {status} (redirect): {location}"),
        ErrorKind::HttpStatus { status, .. } => format!("{provider} returned HTTP {status}"),
        ErrorKind::Timeout => format!("{provider} timed out; check the network or proxy, or lower concurrency and retry"),
        ErrorKind::Tls if provider == javdb::NAME => format!(
            "{provider} connection failed (TLS handshake or unreachable domain); point javdb_base_url in avmc.json at a working mirror, or set proxy.url"
        ),
        ErrorKind::Tls => format!("{provider} connection failed (TLS); set proxy.url or retry later"),
        other => format!("{provider} fetch failed: {other}"),
    }
}
