//! JavDB search result and detail page parsing.

use exn::OptionExt;
use scraper::Html;
use tracing::instrument;

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Code, Metadata};
use crate::text::{first_int, norm_header, norm_list, norm_space, resolve_url, text_of, year_from_release};

/// The `href` of the search result whose title equals `code`, ignoring case.
///
/// JavDB detail URLs are opaque (`/v/abc12`), so the detail page can only be
/// reached through search.
#[instrument(skip(html), fields(html_size = html.len(), code = %code))]
pub fn search_result_href(code: &Code, html: &[u8]) -> Option<String> {
    let document = Html::parse_document(&String::from_utf8_lossy(html));
    document
        .select(&consts::JAVDB_SEARCH_ITEM)
        .find(|item| {
            item.select(&consts::JAVDB_SEARCH_TITLE)
                .next()
                .map(text_of)
                .is_some_and(|title| title.eq_ignore_ascii_case(code.as_str()))
        })
        .and_then(|item| item.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

/// Parse a JavDB detail page for `code`.
///
/// The original-language title wins over the translated one. The cover
/// doubles as fanart.
#[instrument(skip(html), fields(html_size = html.len(), code = %code))]
pub fn parse(code: &Code, html: &[u8], page_url: &str) -> Result<Metadata> {
    if html.is_empty() {
        exn::bail!(ErrorKind::EmptyDocument);
    }
    let document = Html::parse_document(&String::from_utf8_lossy(html));

    let mut meta = Metadata::new(code.clone());
    meta.title = [&consts::JAVDB_ORIGIN_TITLE, &consts::JAVDB_CURRENT_TITLE]
        .into_iter()
        .filter_map(|selector| document.select(selector).next().map(text_of))
        .find(|title| !title.is_empty())
        .ok_or_raise(|| ErrorKind::MissingField("title"))?;

    let mut actors = Vec::new();
    let mut tags = Vec::new();
    for block in document.select(&consts::JAVDB_PANEL_BLOCK) {
        let header = block.select(&consts::JAVDB_PANEL_HEADER).next().map(text_of).unwrap_or_default();
        let value = || block.select(&consts::JAVDB_PANEL_VALUE).next().map(text_of).unwrap_or_default();
        let links = || block.select(&consts::JAVDB_PANEL_LINK).map(text_of);
        match norm_header(&header).as_str() {
            "日期" | "Date" => meta.release = value(),
            "時長" | "时长" | "Length" | "Duration" => meta.runtime_minutes = first_int(&value()),
            "片商" | "Maker" | "Studio" | "Manufacturer" | "Label" => {
                meta.studio = links().next().unwrap_or_default();
            },
            "系列" | "Series" => meta.series = links().next().unwrap_or_default(),
            "演員" | "演员" | "Actor" | "Actors" | "Actress" | "Cast" => actors.extend(links()),
            "類別" | "类别" | "Tag" | "Tags" | "Genre" | "Genres" | "Category" | "Categories" => tags.extend(links()),
            _ => {},
        }
    }
    meta.year = year_from_release(&meta.release);
    meta.actors = norm_list(actors);
    meta.tags = norm_list(tags);
    meta.genres = meta.tags.clone();

    meta.cover_url = document
        .select(&consts::JAVDB_GALLERY)
        .next()
        .and_then(|a| a.value().attr("href"))
        .or_else(|| document.select(&consts::JAVDB_COVER_IMG).next().and_then(|img| img.value().attr("src")))
        .map(|href| resolve_url(page_url, href))
        .unwrap_or_default();
    meta.fanart_url = meta.cover_url.clone();
    meta.website = norm_space(page_url);
    Ok(meta)
}
