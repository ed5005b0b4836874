//! Small text normalizers shared by both page parsers.

use scraper::ElementRef;
use std::collections::HashSet;
use time::Date;
use time::macros::format_description;
use url::Url;

/// Collapse all runs of whitespace into single spaces.
pub(crate) fn norm_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Header cells end in either an ASCII or a full-width colon.
pub(crate) fn norm_header(s: &str) -> String {
    let s = norm_space(s);
    let s = s.strip_suffix(':').unwrap_or(&s);
    let s = s.strip_suffix('：').unwrap_or(s);
    s.trim().to_string()
}

/// Trim, drop empties and drop duplicates, keeping first-seen order.
pub(crate) fn norm_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// The first run of ASCII digits in `s` (`"120分鐘"` → 120).
pub(crate) fn first_int(s: &str) -> Option<u32> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

pub(crate) fn year_from_release(release: &str) -> Option<i32> {
    Date::parse(release.trim(), format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.year())
}

/// Resolve `href` against the page it was found on. Protocol-relative links
/// become https; anything unresolvable is returned trimmed but untouched.
pub(crate) fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    norm_space(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("識別碼:", "識別碼")]
    #[case(" 發行日期： ", "發行日期")]
    #[case("Release   Date :", "Release Date")]
    #[case("Series", "Series")]
    fn test_norm_header(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(norm_header(input), expected);
    }

    #[test]
    fn test_norm_list() {
        assert_eq!(norm_list([" b", "a", "", "b ", "c"]), vec!["b", "a", "c"]);
    }

    #[rstest]
    #[case("120分鐘", Some(120))]
    #[case(" 160 分鍾", Some(160))]
    #[case("約 95 min 30", Some(95))]
    #[case("N/A", None)]
    #[case("0分鐘", None)]
    fn test_first_int(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(first_int(input), expected);
    }

    #[rstest]
    #[case("2023-04-01", Some(2023))]
    #[case(" 1999-12-31 ", Some(1999))]
    #[case("2023/04/01", None)]
    #[case("", None)]
    fn test_year_from_release(#[case] input: &str, #[case] expected: Option<i32>) {
        assert_eq!(year_from_release(input), expected);
    }

    #[rstest]
    #[case("https://www.javbus.com/ABC-123", "/pics/cover/x_b.jpg", "https://www.javbus.com/pics/cover/x_b.jpg")]
    #[case("https://www.javbus.com/ABC-123", "//img.example.com/a.jpg", "https://img.example.com/a.jpg")]
    #[case("https://javdb.com/", "/v/abc12", "https://javdb.com/v/abc12")]
    #[case("https://javdb.com/", "http://cdn.example.com/c.jpg", "http://cdn.example.com/c.jpg")]
    #[case("not a url", "relative.jpg", "relative.jpg")]
    #[case("https://javdb.com/", "  ", "")]
    fn test_resolve_url(#[case] base: &str, #[case] href: &str, #[case] expected: &str) {
        assert_eq!(resolve_url(base, href), expected);
    }
}
