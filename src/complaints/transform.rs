//! Scraped listing items into structured records.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{classify_lines, normalize_date, normalize_request};
use super::segment::ORIGIN_PHRASE;
use crate::core::types::{RawItem, StructuredItem};
use crate::core::url_norm::normalize_href;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());
static LEADING_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{4}-\d{2}-\d{2}\s*").unwrap());

/// Structured record from one scraped title blob.
///
/// The date comes from the first `YYYY-MM-DD` in the blob, else the item's
/// time. The blob minus the origin phrase and leading date is classified
/// like a dump block; the first body line is the title and the rest,
/// space-joined, the summary.
pub fn structured_from_item(item: &RawItem, origin: &str) -> StructuredItem {
    let blob = item.title.trim();
    let date = DATE_RE
        .find(blob)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| item.timestamp.trim().to_string());

    let stripped = blob.replace(ORIGIN_PHRASE, "");
    let stripped = LEADING_DATE_RE.replace(stripped.trim(), "");
    let classes = classify_lines(stripped.lines());

    let mut body = classes.body.into_iter();
    let title = body.next().unwrap_or_default();
    let summary = body.collect::<Vec<_>>().join(" ");

    StructuredItem {
        date: normalize_date(date.trim()),
        title,
        summary,
        object: classes.object,
        demands: normalize_request(&classes.request_raw).join(";"),
        href: normalize_href(&item.link, origin),
    }
}

pub fn transform_structured(items: &[RawItem], origin: &str) -> Vec<StructuredItem> {
    items
        .iter()
        .map(|item| structured_from_item(item, origin))
        .collect()
}

/// Keep trimmed complaint-detail items with a title, first occurrence per link.
pub fn filter_invalid(items: &[RawItem], origin: &str, detail_marker: &str) -> Vec<RawItem> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            let link = normalize_href(&item.link, origin);
            let title = item.title.trim();
            if link.is_empty() || title.is_empty() || !link.contains(detail_marker) {
                return None;
            }
            if !seen.insert(link.clone()) {
                return None;
            }
            Some(RawItem::new(
                title,
                item.content.trim(),
                item.timestamp.trim(),
                link,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://tousu.sina.com.cn";
    const MARKER: &str = "tousu.sina.com.cn/complaint/view/";

    #[test]
    fn blob_is_split_into_fields() {
        let blob = "2024-03-05 于黑猫投诉平台发起\n被多扣200元\n[投诉对象]某某金融\n[投诉要求]退钱，道歉\n客服不回复\n一直拖延\n处理中";
        let item = RawItem::new(blob, "", "昨天", "/complaint/view/17/");
        let s = structured_from_item(&item, ORIGIN);
        assert_eq!(s.date, "2024-03-05");
        assert_eq!(s.title, "被多扣200元");
        assert_eq!(s.summary, "客服不回复 一直拖延");
        assert_eq!(s.object, "某某金融");
        assert_eq!(s.demands, "退款;道歉");
        assert_eq!(s.href, "https://tousu.sina.com.cn/complaint/view/17/");
    }

    #[test]
    fn blob_without_date_uses_item_time() {
        let item = RawItem::new("只有标题", "", " 2024-01-09 ", "");
        let s = structured_from_item(&item, ORIGIN);
        assert_eq!(s.date, "2024-01-09");
        assert_eq!(s.title, "只有标题");
        assert!(s.summary.is_empty());
        assert!(s.href.is_empty());
    }

    #[test]
    fn filter_drops_non_detail_blank_and_duplicate_links() {
        let items = vec![
            RawItem::new(" a ", " c ", " t ", "/complaint/view/1/"),
            RawItem::new("dup", "", "", "https://tousu.sina.com.cn/complaint/view/1/"),
            RawItem::new("", "", "", "/complaint/view/2/"),
            RawItem::new("company", "", "", "/company/3/"),
            RawItem::new("nolink", "", "", ""),
        ];
        let kept = filter_invalid(&items, ORIGIN, MARKER);
        assert_eq!(
            kept,
            vec![RawItem::new(
                "a",
                "c",
                "t",
                "https://tousu.sina.com.cn/complaint/view/1/"
            )]
        );
    }
}
