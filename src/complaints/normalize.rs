//! Field normalization shared by the bulk dump parser and the live transform.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::segment::RawBlock;
use crate::core::types::{ComplaintRecord, ComplaintStatus, Provenance};

pub const OBJECT_MARKER: &str = "[投诉对象]";
pub const REQUEST_MARKER: &str = "[投诉要求]";

/// Demand variants folded into [`REFUND_TOKEN`].
pub const REFUND_SYNONYMS: &[&str] = &["退钱", "退费", "退回所扣费用"];
pub const REFUND_TOKEN: &str = "退款";

static REQUEST_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[，,、/\s]+").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*元").unwrap());

/// Canonical `YYYY-MM-DD`, or the input unchanged when it does not parse.
pub fn normalize_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Split a raw demand line into tokens, folding refund synonyms. Repeats are kept.
pub fn normalize_request(raw: &str) -> Vec<String> {
    REQUEST_SPLIT_RE
        .split(raw)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            if REFUND_SYNONYMS.contains(&t) {
                REFUND_TOKEN.to_string()
            } else {
                t.to_string()
            }
        })
        .collect()
}

/// Every `<number>元` amount in order of appearance, duplicates included.
pub fn extract_amounts(text: &str) -> Vec<String> {
    AMOUNT_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Lines sorted into complaint fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineClasses {
    pub object: String,
    pub request_raw: String,
    pub status: ComplaintStatus,
    /// Everything else that is not blank, in order.
    pub body: Vec<String>,
}

/// Object marker, then demand marker, then exact status, else body.
/// When a field appears more than once the last line wins.
pub fn classify_lines<'a, I>(lines: I) -> LineClasses
where
    I: IntoIterator<Item = &'a str>,
{
    let mut classes = LineClasses::default();
    for line in lines {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(OBJECT_MARKER) {
            classes.object = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix(REQUEST_MARKER) {
            classes.request_raw = rest.trim().to_string();
        } else if let Some(status) = ComplaintStatus::from_line(line) {
            classes.status = status;
        } else if !line.is_empty() {
            classes.body.push(line.to_string());
        }
    }
    classes
}

/// Build the structured record for one segmented block.
pub fn record_from_block(block: &RawBlock, source: &str, block_index: usize) -> ComplaintRecord {
    let mut rest = block.lines.iter().skip(1).map(String::as_str).skip_while(|l| l.is_empty());
    let title = rest.next().unwrap_or_default().to_string();
    let classes = classify_lines(rest);

    let description = classes.body.join("\n");
    let amounts = extract_amounts(&format!("{title} {description}"));

    ComplaintRecord {
        date: normalize_date(&block.anchor_date),
        title,
        description,
        complaint_object: classes.object,
        complaint_request: normalize_request(&classes.request_raw),
        status: classes.status,
        amounts,
        provenance: Provenance {
            source_identifier: source.to_string(),
            block_index,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_is_canonical_or_passed_through() {
        assert_eq!(normalize_date("2024-03-05"), "2024-03-05");
        assert_eq!(normalize_date("not-a-date"), "not-a-date");
        assert_eq!(normalize_date("2024-02-30"), "2024-02-30");
    }

    #[test]
    fn request_tokens_fold_refund_synonyms() {
        assert_eq!(
            normalize_request("退钱，原价/服务费"),
            vec!["退款", "原价", "服务费"]
        );
        assert_eq!(normalize_request("退费、 退费 ,道歉"), vec!["退款", "退款", "道歉"]);
        assert!(normalize_request("  ").is_empty());
    }

    #[test]
    fn amounts_keep_order_and_repeats() {
        assert_eq!(extract_amounts("本金500元，利息30.5元"), vec!["500", "30.5"]);
        assert_eq!(extract_amounts("500 元 又 500元"), vec!["500", "500"]);
        assert!(extract_amounts("没有金额").is_empty());
    }

    #[test]
    fn classification_priority() {
        let lines = [
            "[投诉对象]某某金融",
            "[投诉要求]退钱/道歉",
            "处理中",
            "正文一",
            "",
            "正文二",
        ];
        let c = classify_lines(lines);
        assert_eq!(c.object, "某某金融");
        assert_eq!(c.request_raw, "退钱/道歉");
        assert_eq!(c.status, ComplaintStatus::Processing);
        assert_eq!(c.body, vec!["正文一", "正文二"]);
    }

    #[test]
    fn record_title_skips_leading_blank_lines() {
        let block = RawBlock {
            anchor_date: "2024-03-05".into(),
            start: 0,
            end: 0,
            lines: vec![
                "2024-03-05 于黑猫投诉平台发起".into(),
                "".into(),
                "被扣费200元".into(),
                "[投诉要求]退回所扣费用".into(),
                "已回复".into(),
            ],
        };
        let r = record_from_block(&block, "dump.txt", 1);
        assert_eq!(r.title, "被扣费200元");
        assert_eq!(r.description, "");
        assert_eq!(r.complaint_request, vec!["退款"]);
        assert_eq!(r.status, ComplaintStatus::Replied);
        assert_eq!(r.amounts, vec!["200"]);
        assert_eq!(r.provenance.block_index, 1);
    }
}
