use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

/// Resolve a scraped `href` against the site origin.
///
/// * `""` stays empty
/// * `//host/p` gets an `https:` scheme
/// * `/p` is joined onto `origin`
/// * anything else is returned trimmed
pub fn normalize_href(raw: &str, origin: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.starts_with("//") {
        return format!("https:{s}");
    }
    if s.starts_with('/') {
        return Url::parse(origin)
            .and_then(|base| base.join(s))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| s.to_string());
    }
    s.to_string()
}

/// Keyword search URL: `<origin><search_path>?keywords=<kw>&t=<t>`.
pub fn keyword_search_url(origin: &str, search_path: &str, keyword: &str, search_type: u32) -> String {
    let encoded = utf8_percent_encode(keyword, NON_ALPHANUMERIC);
    format!(
        "{}{}?keywords={}&t={}",
        origin.trim_end_matches('/'),
        search_path,
        encoded,
        search_type
    )
}

/// Output tag for a single-URL crawl: first path segment, else host, else `page`.
pub fn url_tag(raw: &str) -> String {
    let Ok(url) = Url::parse(raw.trim()) else {
        return "page".to_string();
    };
    if let Some(first) = url
        .path_segments()
        .and_then(|mut segs| segs.find(|s| !s.is_empty()))
    {
        return first.to_string();
    }
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_string())
        .unwrap_or_else(|| "page".to_string())
}
