use std::sync::LazyLock;

use regex::Regex;

/// Marks where a raw dump starts a complaint.
pub const ORIGIN_PHRASE: &str = "于黑猫投诉平台发起";

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^(\d{4}-\d{2}-\d{2})\s+于黑猫投诉平台发起$").unwrap());
static CODE_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}$").unwrap());
static ALIAS_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}]{1,6}喵$").unwrap());

/// Span of one complaint inside a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub anchor_date: String,
    /// Byte offset of the anchor line start.
    pub start: usize,
    /// Byte offset of the next anchor, or the dump length.
    pub end: usize,
    /// Trimmed lines, anchor first, platform noise removed.
    pub lines: Vec<String>,
}

/// Bare status codes and `<alias>喵` user tags rendered by the platform UI.
pub fn is_noise_line(line: &str) -> bool {
    CODE_NOISE_RE.is_match(line) || ALIAS_NOISE_RE.is_match(line)
}

/// One block per anchor line, in anchor order.
pub fn segment(dump: &str) -> Vec<RawBlock> {
    let anchors: Vec<(usize, String)> = ANCHOR_RE
        .captures_iter(dump)
        .filter_map(|c| Some((c.get(0)?.start(), c.get(1)?.as_str().to_string())))
        .collect();

    anchors
        .iter()
        .enumerate()
        .map(|(idx, (start, date))| {
            let end = anchors.get(idx + 1).map_or(dump.len(), |(next, _)| *next);
            RawBlock {
                anchor_date: date.clone(),
                start: *start,
                end,
                lines: clean_lines(&dump[*start..end]),
            }
        })
        .collect()
}

fn clean_lines(block: &str) -> Vec<String> {
    let mut lines = block.trim().lines().map(str::trim);
    let Some(anchor) = lines.next() else {
        return Vec::new();
    };
    std::iter::once(anchor)
        .chain(lines.filter(|l| !is_noise_line(l)))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_must_fill_the_line() {
        let dump = "2024-01-01 于黑猫投诉平台发起\nx\n前缀 2024-01-02 于黑猫投诉平台发起\n";
        assert_eq!(segment(dump).len(), 1);
    }

    #[test]
    fn crlf_dumps_are_segmented() {
        let dump = "2024-01-01 于黑猫投诉平台发起\r\n标题\r\n2024-01-02 于黑猫投诉平台发起\r\n";
        let blocks = segment(dump);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines, vec!["2024-01-01 于黑猫投诉平台发起", "标题"]);
    }

    #[test]
    fn noise_patterns() {
        assert!(is_noise_line("200"));
        assert!(is_noise_line("小美喵"));
        assert!(!is_noise_line("2000"));
        assert!(!is_noise_line("喵"));
        assert!(!is_noise_line("七个字的名字呀喵"));
    }

    #[test]
    fn anchor_line_is_never_stripped() {
        let blocks = segment("2024-01-01 于黑猫投诉平台发起");
        assert_eq!(blocks[0].lines, vec!["2024-01-01 于黑猫投诉平台发起"]);
    }
}
