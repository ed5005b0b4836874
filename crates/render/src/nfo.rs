//! Kodi/Jellyfin/Emby movie NFO documents.
//!
//! The document is an [upon] template. Every interpolated string goes
//! through the `xml` formatter; lists are trimmed and deduplicated (first
//! occurrence wins) before they reach the template, and empty optional
//! elements are left out entirely.

use std::collections::HashSet;

use avmc_extract::Metadata;
use exn::ResultExt;
use tracing::instrument;
use upon::{Engine, Template};

use crate::error::{ErrorKind, Result};
use crate::{FANART_FILE, POSTER_FILE};

const MPAA: &str = "R18+";
const COUNTRY: &str = "JP";

const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>
<movie>
  <title>{{ title|xml }}</title>
  <sorttitle>{{ code|xml }}</sorttitle>
  <num>{{ code|xml }}</num>
  {%- if studio %}
  <studio>{{ studio|xml }}</studio>
  {%- endif %}
  {%- if series %}
  <set>{{ series|xml }}</set>
  {%- endif %}
  {%- if release %}
  <release>{{ release|xml }}</release>
  <premiered>{{ release|xml }}</premiered>
  {%- endif %}
  {%- if year %}
  <year>{{ year }}</year>
  {%- endif %}
  {%- if runtime %}
  <runtime>{{ runtime }}</runtime>
  {%- endif %}
  <mpaa>{{ mpaa|xml }}</mpaa>
  <country>{{ country|xml }}</country>
  <poster>{{ poster|xml }}</poster>
  <thumb>{{ poster|xml }}</thumb>
  <fanart>{{ fanart|xml }}</fanart>
  <rating>0</rating>
  <userrating>0</userrating>
  <votes>0</votes>
  {%- for actor in actors %}
  <actor>
    <name>{{ actor|xml }}</name>
    <role>{{ actor|xml }}</role>
  </actor>
  {%- endfor %}
  {%- for tag in tags %}
  <tag>{{ tag|xml }}</tag>
  {%- endfor %}
  {%- for genre in genres %}
  <genre>{{ genre|xml }}</genre>
  {%- endfor %}
  {%- if cover %}
  <cover>{{ cover|xml }}</cover>
  {%- endif %}
  {%- if website %}
  <website>{{ website|xml }}</website>
  {%- endif %}
</movie>
"#;

/// Renders [`Metadata`] as an NFO document. Compile once, render many.
pub struct NfoRenderer {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl NfoRenderer {
    pub fn new() -> Result<Self> {
        let mut engine = Engine::new();
        engine.add_formatter("xml", addons::xml_formatter);
        let template = engine.compile(TEMPLATE).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }

    #[instrument(skip_all, fields(code = %meta.code))]
    pub fn render(&self, meta: &Metadata) -> Result<Vec<u8>> {
        let xml = self
            .template
            .render(&self.engine, Self::parameters(meta))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Ok(xml.into_bytes())
    }

    fn parameters(meta: &Metadata) -> upon::Value {
        let code = meta.code.as_str();
        let title = meta.title.trim();
        let title = match title {
            "" => code.to_string(),
            title if title.starts_with(code) => title.to_string(),
            title => format!("{code} {title}"),
        };
        let actors = dedup(&meta.actors);
        let tags = dedup(meta.tags.iter().chain(&meta.actors));
        let genres = dedup(meta.genres.iter().chain(&meta.actors));
        upon::value! {
            title: title,
            code: code,
            studio: meta.studio.trim(),
            series: meta.series.trim(),
            release: meta.release.trim(),
            year: meta.year.filter(|y| *y > 0).map(i64::from),
            runtime: meta.runtime_minutes.filter(|m| *m > 0).map(i64::from),
            mpaa: MPAA,
            country: COUNTRY,
            poster: POSTER_FILE,
            fanart: FANART_FILE,
            actors: actors,
            tags: tags,
            genres: genres,
            cover: meta.cover_url.trim(),
            website: meta.website.trim(),
        }
    }
}

/// Trimmed, non-empty, first occurrence wins.
fn dedup<'a>(items: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty() && seen.insert(*item))
        .map(str::to_string)
        .collect()
}

mod addons {
    use std::fmt::Write;
    use upon::{Value, fmt as upon_fmt};

    /// Escape a string for XML text content. Characters XML 1.0 can't carry
    /// at all become U+FFFD.
    pub(super) fn escape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&#34;"),
                '\'' => out.push_str("&#39;"),
                '\t' | '\n' | '\r' => out.push(c),
                c if c.is_control() => out.push('\u{FFFD}'),
                c => out.push(c),
            }
        }
        out
    }

    pub(super) fn xml_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", escape(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }
}
