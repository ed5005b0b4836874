use super::Code;

/// Everything a provider page tells us about one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub code: Code,
    /// Title as shown on the page (code prefix removed where the page adds one)
    pub title: String,
    pub studio: String,
    pub series: String,
    /// Release date as printed, normally `YYYY-MM-DD`
    pub release: String,
    /// Derived from `release` when it parses as a date
    pub year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    /// Page the metadata came from; overwritten by the scraper with the URL
    /// that was actually fetched.
    pub website: String,
    pub cover_url: String,
    /// Background image; the poster is cropped from it.
    pub fanart_url: String,
}
impl Metadata {
    pub fn new(code: Code) -> Self {
        Self {
            code,
            title: String::new(),
            studio: String::new(),
            series: String::new(),
            release: String::new(),
            year: None,
            runtime_minutes: None,
            actors: Vec::new(),
            genres: Vec::new(),
            tags: Vec::new(),
            website: String::new(),
            cover_url: String::new(),
            fanart_url: String::new(),
        }
    }
}
