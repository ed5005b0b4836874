//! JavBus detail page parsing.
//!
//! The info block is a list of `<p>` rows, each led by a `span.header`
//! whose text depends on the site language. Rows are matched by header so
//! the parser works against the traditional Chinese, simplified Chinese,
//! English and Japanese variants of the page.

use exn::OptionExt;
use scraper::Html;
use tracing::instrument;

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Code, Metadata};
use crate::text::{first_int, norm_header, norm_list, norm_space, resolve_url, text_of, year_from_release};

const ID_HEADERS: &[&str] = &["識別碼", "识别码", "ID"];
const RELEASE_HEADERS: &[&str] = &["發行日期", "发行日期", "Release Date", "発売日"];
const RUNTIME_HEADERS: &[&str] = &["長度", "长度", "Length", "時長", "时长", "Duration"];
const LABEL_HEADERS: &[&str] = &["發行商", "发行商", "Label", "Publisher"];
const STUDIO_HEADERS: &[&str] = &["製作商", "制作商", "Studio", "Maker", "Manufacturer"];
const SERIES_HEADERS: &[&str] = &["系列", "Series"];

/// Parse a JavBus detail page for `code`.
///
/// The page must carry an ID row equal to `code` (case-insensitively) and a
/// title; anything else is treated as a verification or redirect page.
#[instrument(skip(html), fields(html_size = html.len(), code = %code))]
pub fn parse(code: &Code, html: &[u8], page_url: &str) -> Result<Metadata> {
    if html.is_empty() {
        exn::bail!(ErrorKind::EmptyDocument);
    }
    let document = Html::parse_document(&String::from_utf8_lossy(html));

    let id = info_value(&document, ID_HEADERS).ok_or_raise(|| ErrorKind::MissingField("id"))?;
    if !id.eq_ignore_ascii_case(code.as_str()) {
        exn::bail!(ErrorKind::CodeMismatch {
            expected: code.to_string(),
            found: id,
        });
    }

    let title = document.select(&consts::JAVBUS_TITLE).next().map(text_of).unwrap_or_default();
    if title.is_empty() {
        exn::bail!(ErrorKind::MissingField("title"));
    }
    let title = match title.strip_prefix(code.as_str()) {
        Some(rest) => rest.trim().to_string(),
        None => title,
    };

    let release = info_value(&document, RELEASE_HEADERS).unwrap_or_default();
    let runtime_minutes = info_value(&document, RUNTIME_HEADERS).as_deref().and_then(first_int);
    let studio = info_value(&document, LABEL_HEADERS)
        .or_else(|| info_value(&document, STUDIO_HEADERS))
        .unwrap_or_default();
    let series = info_value(&document, SERIES_HEADERS).unwrap_or_default();
    let actors = norm_list(document.select(&consts::JAVBUS_STAR).map(text_of));

    let mut genres = keyword_tags(&document, code, &studio, &series);
    if genres.is_empty() {
        // Keywords are missing on some mirrors; genre links are noisier but
        // better than nothing.
        genres = norm_list(
            document
                .select(&consts::ANCHOR_SELECTOR)
                .filter(|a| a.value().attr("href").is_some_and(|href| href.contains("/genre/")))
                .map(text_of),
        );
    }

    let first_attr = |selector: &scraper::Selector, attr: &str| {
        document
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(|href| resolve_url(page_url, href))
            .filter(|url| !url.is_empty())
    };
    let cover_url = first_attr(&consts::JAVBUS_BIG_IMAGE, "href")
        .or_else(|| first_attr(&consts::JAVBUS_SCREENCAP, "src"))
        .unwrap_or_default();
    let fanart_url = match cover_url.is_empty() {
        true => first_attr(&consts::JAVBUS_SAMPLE, "href").unwrap_or_default(),
        false => cover_url.clone(),
    };

    Ok(Metadata {
        code: code.clone(),
        title,
        year: year_from_release(&release),
        release,
        runtime_minutes,
        studio,
        series,
        actors,
        // JavBus categories double as both genres and tags.
        tags: genres.clone(),
        genres,
        website: page_url.trim().to_string(),
        cover_url,
        fanart_url,
    })
}

/// Value of the first info row whose header is one of `headers`. A linked
/// value (studio, series) wins over the row's bare text.
fn info_value(document: &Html, headers: &[&str]) -> Option<String> {
    for row in document.select(&consts::JAVBUS_INFO_ROW) {
        let raw_header = row.select(&consts::JAVBUS_INFO_HEADER).next().map(text_of).unwrap_or_default();
        if !headers.contains(&norm_header(&raw_header).as_str()) {
            continue;
        }
        if let Some(link) = row.select(&consts::ANCHOR_SELECTOR).next().map(text_of)
            && !link.is_empty()
        {
            return Some(link);
        }
        let text = text_of(row);
        let value = text.strip_prefix(raw_header.as_str()).unwrap_or(&text).trim();
        return Some(value.to_string()).filter(|v| !v.is_empty());
    }
    None
}

/// `<meta name="keywords">` reads `CODE,Studio,Series,Tag1,Tag2,...`; keep
/// whatever isn't one of the known leading entries.
fn keyword_tags(document: &Html, code: &Code, studio: &str, series: &str) -> Vec<String> {
    let Some(content) = document
        .select(&consts::JAVBUS_KEYWORDS)
        .next()
        .and_then(|meta| meta.value().attr("content"))
    else {
        return Vec::new();
    };
    norm_list(content.split(',').map(norm_space).filter(|keyword| {
        !keyword.eq_ignore_ascii_case(code.as_str())
            && (studio.is_empty() || keyword != studio)
            && (series.is_empty() || keyword != series)
    }))
}
