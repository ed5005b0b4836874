use crate::error::{Error, ErrorKind};
use avmc_extract::{Code, Metadata};
use exn::ResultExt;

/// On-disk shape of a structured cache entry.
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct MetadataRecord {
    pub code: String,
    #[facet(default)]
    pub title: String,
    #[facet(default)]
    pub studio: String,
    #[facet(default)]
    pub series: String,
    #[facet(default)]
    pub release: String,
    #[facet(default, skip_serializing_if = Option::is_none)]
    pub year: Option<i32>,
    #[facet(rename = "runtime", default, skip_serializing_if = Option::is_none)]
    pub runtime_minutes: Option<u32>,
    #[facet(default)]
    pub actors: Vec<String>,
    #[facet(default)]
    pub genres: Vec<String>,
    #[facet(default)]
    pub tags: Vec<String>,
    #[facet(default)]
    pub website: String,
    #[facet(rename = "cover", default)]
    pub cover_url: String,
    #[facet(rename = "fanart", default)]
    pub fanart_url: String,
}
impl From<&Metadata> for MetadataRecord {
    fn from(meta: &Metadata) -> Self {
        Self {
            code: meta.code.to_string(),
            title: meta.title.clone(),
            studio: meta.studio.clone(),
            series: meta.series.clone(),
            release: meta.release.clone(),
            year: meta.year,
            runtime_minutes: meta.runtime_minutes,
            actors: meta.actors.clone(),
            genres: meta.genres.clone(),
            tags: meta.tags.clone(),
            website: meta.website.clone(),
            cover_url: meta.cover_url.clone(),
            fanart_url: meta.fanart_url.clone(),
        }
    }
}
impl TryFrom<MetadataRecord> for Metadata {
    type Error = Error;
    fn try_from(record: MetadataRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            code: Code::parse(&record.code).or_raise(|| ErrorKind::InvalidData("code"))?,
            title: record.title,
            studio: record.studio,
            series: record.series,
            release: record.release,
            year: record.year,
            runtime_minutes: record.runtime_minutes,
            actors: record.actors,
            genres: record.genres,
            tags: record.tags,
            website: record.website,
            cover_url: record.cover_url,
            fanart_url: record.fanart_url,
        })
    }
}
