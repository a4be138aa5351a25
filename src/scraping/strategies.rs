//! Listing extraction strategies over a captured HTML document.
//!
//! Strategies run in priority order and the first one that yields at least
//! one item wins. Lookup failures inside a strategy mean "no match".

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::core::types::RawItem;
use crate::core::url_norm::normalize_href;

/// Selector groups tried in order for listing pages.
pub const LISTING_SELECTORS: &[&str] = &[
    "div.search-list div.item",
    "ul.search-list li",
    "div.list-item",
    "div.item",
    "li.item",
    "div.company-list li",
    "ul.company-list li",
    "[class*='company'] li",
    "[class*='company'] .item",
];

pub const ANCHOR_SELECTOR: &str =
    "a[href*='/index/'], a[href*='complaint'], a[href*='view'], a[href*='/company']";

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

static LINK: LazyLock<Selector> = LazyLock::new(|| sel("a"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("[class*='title']"));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| sel("p, [class*='content'], [class*='cont']"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| sel("p"));
static TIME: LazyLock<Selector> = LazyLock::new(|| sel("span.time, .time, div.time, [data-time]"));

static DETAIL_TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["h1", "[class*='title']", ".detail-title", "header h1"]
        .into_iter()
        .map(sel)
        .collect()
});
static DETAIL_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "[class*='content']",
        "[class*='cont']",
        "article",
        ".detail-content",
        "div.content",
    ]
    .into_iter()
    .map(sel)
    .collect()
});
static DETAIL_TIME: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["span.time", ".time", "div.time", "[data-time]"]
        .into_iter()
        .map(sel)
        .collect()
});

/// A parsed page plus the URL it was captured from.
pub struct PageDocument {
    pub url: String,
    pub html: Html,
}

impl PageDocument {
    pub fn parse(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            html: Html::parse_document(html),
        }
    }
}

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the strategy does not apply or extracts nothing.
    fn try_extract(&self, doc: &PageDocument) -> Option<Vec<RawItem>>;
}

/// Parse `html` and return the items of the first strategy that yields any.
///
/// Kept synchronous so the parsed document never crosses an `.await`.
pub fn run_strategies(
    url: &str,
    html: &str,
    strategies: &[Box<dyn ExtractionStrategy>],
) -> Vec<RawItem> {
    let doc = PageDocument::parse(url, html);
    for strategy in strategies {
        if let Some(items) = strategy.try_extract(&doc).filter(|v| !v.is_empty()) {
            debug!("strategy {} matched {} items", strategy.name(), items.len());
            return items;
        }
    }
    Vec::new()
}

/// Visible text of an element, one trimmed text node per line.
pub fn inner_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_text(el: ElementRef<'_>, selector: &Selector) -> String {
    el.select(selector).next().map(inner_text).unwrap_or_default()
}

fn time_of(el: ElementRef<'_>) -> String {
    el.select(&TIME)
        .next()
        .map(|t| {
            let text = inner_text(t);
            if text.is_empty() {
                t.value().attr("data-time").unwrap_or_default().trim().to_string()
            } else {
                text
            }
        })
        .unwrap_or_default()
}

/// Items are the elements matched by one CSS group.
pub struct SelectorGroupStrategy {
    css: String,
    selector: Selector,
    origin: String,
}

impl SelectorGroupStrategy {
    pub fn new(css: &str, origin: &str) -> Option<Self> {
        let selector = Selector::parse(css).ok()?;
        Some(Self {
            css: css.to_string(),
            selector,
            origin: origin.to_string(),
        })
    }

    fn item_from(&self, el: ElementRef<'_>) -> Option<RawItem> {
        let (link, mut title) = match el.select(&LINK).next() {
            Some(a) => (
                normalize_href(a.value().attr("href").unwrap_or_default(), &self.origin),
                inner_text(a),
            ),
            None => (String::new(), String::new()),
        };
        if title.is_empty() {
            title = first_text(el, &TITLE);
        }
        let content = first_text(el, &DESCRIPTION);
        if title.is_empty() && content.is_empty() {
            return None;
        }
        Some(RawItem::new(title, content, time_of(el), link))
    }
}

impl ExtractionStrategy for SelectorGroupStrategy {
    fn name(&self) -> &str {
        &self.css
    }

    fn try_extract(&self, doc: &PageDocument) -> Option<Vec<RawItem>> {
        let mut matched = doc.html.select(&self.selector).peekable();
        matched.peek()?;
        let items: Vec<RawItem> = matched.filter_map(|el| self.item_from(el)).collect();
        (!items.is_empty()).then_some(items)
    }
}

/// Broad fallback: complaint-looking anchors plus a parent-sibling lookup.
pub struct AnchorHeuristicStrategy {
    selector: Selector,
    origin: String,
}

impl AnchorHeuristicStrategy {
    pub fn new(origin: &str) -> Self {
        Self {
            selector: sel(ANCHOR_SELECTOR),
            origin: origin.to_string(),
        }
    }
}

impl ExtractionStrategy for AnchorHeuristicStrategy {
    fn name(&self) -> &str {
        "anchor-heuristic"
    }

    fn try_extract(&self, doc: &PageDocument) -> Option<Vec<RawItem>> {
        let items: Vec<RawItem> = doc
            .html
            .select(&self.selector)
            .filter_map(|a| {
                let link = normalize_href(a.value().attr("href").unwrap_or_default(), &self.origin);
                let title = inner_text(a);
                let parent = a.parent().and_then(ElementRef::wrap);
                let (content, time) = parent
                    .map(|p| (first_text(p, &PARAGRAPH), time_of(p)))
                    .unwrap_or_default();
                let keep = !title.is_empty() && (!link.is_empty() || !content.is_empty());
                keep.then(|| RawItem::new(title, content, time, link))
            })
            .collect();
        (!items.is_empty()).then_some(items)
    }
}

/// Single complaint detail page: one item linked to the page itself.
#[derive(Debug, Default)]
pub struct DetailPageStrategy;

impl DetailPageStrategy {
    pub fn new() -> Self {
        Self
    }
}

fn first_non_empty(html: &Html, selectors: &[Selector]) -> String {
    selectors
        .iter()
        .filter_map(|s| html.select(s).next())
        .map(inner_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

impl ExtractionStrategy for DetailPageStrategy {
    fn name(&self) -> &str {
        "detail-page"
    }

    fn try_extract(&self, doc: &PageDocument) -> Option<Vec<RawItem>> {
        let title = first_non_empty(&doc.html, &DETAIL_TITLE);
        let content = first_non_empty(&doc.html, &DETAIL_CONTENT);
        if title.is_empty() && content.is_empty() {
            return None;
        }
        let time = first_non_empty(&doc.html, &DETAIL_TIME);
        Some(vec![RawItem::new(title, content, time, doc.url.clone())])
    }
}

/// Selector groups in priority order, then the anchor heuristic.
pub fn default_listing_strategies(origin: &str) -> Vec<Box<dyn ExtractionStrategy>> {
    let mut strategies: Vec<Box<dyn ExtractionStrategy>> = LISTING_SELECTORS
        .iter()
        .filter_map(|css| SelectorGroupStrategy::new(css, origin))
        .map(|s| Box::new(s) as Box<dyn ExtractionStrategy>)
        .collect();
    strategies.push(Box::new(AnchorHeuristicStrategy::new(origin)));
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://tousu.sina.com.cn";

    #[test]
    fn first_matching_group_wins() {
        let html = r#"
            <div class="search-list">
              <div class="item">
                <a href="//tousu.sina.com.cn/complaint/view/1/">标题一</a>
                <p>内容一</p>
                <span class="time">2024-01-02</span>
              </div>
              <div class="item"><div class="title">无链接</div></div>
            </div>
            <li class="item"><a href="/x">ignored</a></li>
        "#;
        let items = run_strategies(ORIGIN, html, &default_listing_strategies(ORIGIN));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://tousu.sina.com.cn/complaint/view/1/");
        assert_eq!(items[0].content, "内容一");
        assert_eq!(items[0].timestamp, "2024-01-02");
        assert_eq!(items[1].title, "无链接");
        assert!(items[1].link.is_empty());
    }

    #[test]
    fn anchor_heuristic_when_no_group_matches() {
        let html = r#"
            <section>
              <a href="/complaint/view/9/">投诉九</a>
              <p>描述</p>
              <span class="time">昨天</span>
            </section>
            <a href="/about">关于</a>
        "#;
        let items = run_strategies(ORIGIN, html, &default_listing_strategies(ORIGIN));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "投诉九");
        assert_eq!(items[0].content, "描述");
        assert_eq!(items[0].timestamp, "昨天");
    }

    #[test]
    fn nothing_matches_yields_empty() {
        let items = run_strategies(ORIGIN, "<p>plain</p>", &default_listing_strategies(ORIGIN));
        assert!(items.is_empty());
    }

    #[test]
    fn detail_page_links_to_itself() {
        let html = r#"<h1>退款难</h1><div class="content">一直不退</div><span data-time="x" class="time">2024-05-01</span>"#;
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![Box::new(DetailPageStrategy::new())];
        let url = "https://tousu.sina.com.cn/complaint/view/17/";
        let items = run_strategies(url, html, &strategies);
        assert_eq!(items, vec![RawItem::new("退款难", "一直不退", "2024-05-01", url)]);
    }

    #[test]
    fn inner_text_keeps_line_structure() {
        let doc = Html::parse_fragment("<div><b>a</b>\n  <i> b </i></div>");
        let div = doc.select(&sel("div")).next().unwrap();
        assert_eq!(inner_text(div), "a\nb");
    }
}
