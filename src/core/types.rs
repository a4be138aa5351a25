use serde::{Deserialize, Serialize};

/// One listing entry as captured from a live page.
///
/// Serialized with the scraped raw item schema `{title, content, time, href}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "time", default)]
    pub timestamp: String,
    #[serde(rename = "href", default)]
    pub link: String,
}

impl RawItem {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            timestamp: timestamp.into(),
            link: link.into(),
        }
    }
}

/// Row of the incremental log and of the raw CSV: a raw item tagged with its keyword.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedItem<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub time: &'a str,
    pub href: &'a str,
    pub keyword: &'a str,
}

impl<'a> LoggedItem<'a> {
    pub fn new(item: &'a RawItem, keyword: &'a str) -> Self {
        Self {
            title: item.title.trim(),
            content: item.content.trim(),
            time: item.timestamp.trim(),
            href: item.link.trim(),
            keyword,
        }
    }
}

/// Fixed status vocabulary of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComplaintStatus {
    #[serde(rename = "已回复")]
    Replied,
    #[serde(rename = "处理中")]
    Processing,
    #[serde(rename = "待分配")]
    Unassigned,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl ComplaintStatus {
    /// Exact match against the vocabulary; anything else is not a status line.
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "已回复" => Some(Self::Replied),
            "处理中" => Some(Self::Processing),
            "待分配" => Some(Self::Unassigned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replied => "已回复",
            Self::Processing => "处理中",
            Self::Unassigned => "待分配",
            Self::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_identifier: String,
    pub block_index: usize,
}

/// Structured complaint produced by the bulk parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    /// ISO `YYYY-MM-DD` when parseable, else the original string.
    pub date: String,
    pub title: String,
    pub description: String,
    pub complaint_object: String,
    /// Normalized demand tokens, in original order.
    pub complaint_request: Vec<String>,
    pub status: ComplaintStatus,
    /// Numeric strings in order of appearance, duplicates kept.
    pub amounts: Vec<String>,
    pub provenance: Provenance,
}

/// Column order of the bulk CSV.
pub const COMPLAINT_CSV_COLUMNS: [&str; 9] = [
    "date",
    "title",
    "description",
    "complaint_object",
    "complaint_request",
    "status",
    "amount_list",
    "source_file",
    "block_index",
];

#[derive(Debug, Serialize)]
pub struct ComplaintCsvRow<'a> {
    pub date: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub complaint_object: &'a str,
    pub complaint_request: String,
    pub status: &'a str,
    pub amount_list: String,
    pub source_file: &'a str,
    pub block_index: usize,
}

impl ComplaintRecord {
    pub fn to_csv_row(&self) -> ComplaintCsvRow<'_> {
        ComplaintCsvRow {
            date: &self.date,
            title: &self.title,
            description: &self.description,
            complaint_object: &self.complaint_object,
            complaint_request: self.complaint_request.join(";"),
            status: self.status.as_str(),
            amount_list: self.amounts.join(";"),
            source_file: &self.provenance.source_identifier,
            block_index: self.provenance.block_index,
        }
    }
}

/// Structured record produced from a scraped title blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredItem {
    pub date: String,
    pub title: String,
    pub summary: String,
    pub object: String,
    pub demands: String,
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    #[default]
    Both,
}

impl OutputFormat {
    pub fn parse_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "both" | "" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn wants_json(&self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn wants_csv(&self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub err: String,
}

impl ErrorResponse {
    pub fn new(err: impl Into<String>) -> Self {
        Self {
            ok: false,
            err: err.into(),
        }
    }
}
