use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Letters, one or more separators, digits. Unanchored so that
// `[Group] abc_123 (1080p)` still yields a candidate. Separators are ASCII
// only: a full-width or no-break space does not join letters to digits.
regex!(CANDIDATE_REGEX, r"(?i)([a-z]{2,6})[ \t\n\f\r._-]+([0-9]{2,5})");
regex!(CODE_REGEX, r"^[A-Z]{2,6}-[0-9]{2,5}$");

// JavBus detail page.
selector!(JAVBUS_INFO_ROW, "div.movie div.info p");
selector!(JAVBUS_INFO_HEADER, "span.header");
selector!(JAVBUS_TITLE, "h3");
selector!(JAVBUS_STAR, "div.star-name a");
selector!(JAVBUS_KEYWORDS, "meta[name='keywords']");
selector!(JAVBUS_BIG_IMAGE, "a.bigImage");
selector!(JAVBUS_SCREENCAP, "div.screencap img");
selector!(JAVBUS_SAMPLE, "#sample-waterfall a.sample-box");

// JavDB search results and detail page.
selector!(JAVDB_SEARCH_ITEM, "div.movie-list div.item a.box");
selector!(JAVDB_SEARCH_TITLE, "div.video-title strong");
selector!(JAVDB_ORIGIN_TITLE, "h2.title span.origin-title");
selector!(JAVDB_CURRENT_TITLE, "h2.title strong.current-title");
selector!(JAVDB_PANEL_BLOCK, "nav.movie-panel-info .panel-block");
selector!(JAVDB_PANEL_HEADER, "strong");
selector!(JAVDB_PANEL_VALUE, "span.value");
selector!(JAVDB_PANEL_LINK, "span.value a");
selector!(JAVDB_GALLERY, ".column-video-cover a[data-fancybox='gallery']");
selector!(JAVDB_COVER_IMG, ".column-video-cover img.video-cover");

selector!(ANCHOR_SELECTOR, "a");
