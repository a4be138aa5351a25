//! Verification-challenge markers in a captured page.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use scraper::{Html, Selector};

const TEXT_MARKERS: &[&str] = &["验证码"];

static TEXT_MATCHER: LazyLock<Option<AhoCorasick>> =
    LazyLock::new(|| AhoCorasick::new(TEXT_MARKERS).ok());

static ELEMENT_MARKERS: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse("iframe[src*='captcha'], [class*='geetest'], [id*='geetest']").ok()
});

static BODY: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("body").ok());

/// `true` when the page shows a captcha widget or captcha wording.
///
/// Only visible body text is scanned, so marker words inside scripts or
/// attributes do not count. Any lookup failure answers `false`.
pub fn has_challenge_markers(html: &str) -> bool {
    let doc = Html::parse_document(html);

    if let Some(markers) = ELEMENT_MARKERS.as_ref() {
        if doc.select(markers).next().is_some() {
            return true;
        }
    }

    let (Some(matcher), Some(body)) = (TEXT_MATCHER.as_ref(), BODY.as_ref()) else {
        return false;
    };
    doc.select(body).next().is_some_and(|b| {
        b.descendants()
            .filter_map(|n| n.value().as_text().map(|t| (n, t)))
            .filter(|(n, _)| {
                !n.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
                })
            })
            .any(|(_, t)| matcher.is_match(&**t))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_text_is_detected() {
        assert!(has_challenge_markers("<body><div>请输入验证码</div></body>"));
    }

    #[test]
    fn geetest_widget_is_detected() {
        assert!(has_challenge_markers(r#"<div class="geetest_panel"></div>"#));
        assert!(has_challenge_markers(r#"<iframe src="https://x/captcha?id=1"></iframe>"#));
    }

    #[test]
    fn script_text_does_not_count() {
        assert!(!has_challenge_markers(
            "<body><script>var s = '验证码';</script><p>列表</p></body>"
        ));
        assert!(!has_challenge_markers("<body><p>正常页面</p></body>"));
    }
}
