use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::{ensure_parent, SinkError};
use crate::core::types::{ComplaintRecord, OutputFormat, StructuredItem, COMPLAINT_CSV_COLUMNS};

/// Paths produced by one save, `None` for formats not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl OutputPaths {
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.json.iter().chain(self.csv.iter())
    }
}

/// Filesystem-safe form of a keyword or URL tag.
pub fn sanitize_tag(tag: &str) -> String {
    let cleaned: String = tag
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "page".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<tag>_<YYYYmmdd_HHMMSS>` in local time.
pub fn base_name(tag: &str) -> String {
    format!(
        "{}_{}",
        sanitize_tag(tag),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Pretty JSON with 2-space indent; non-ASCII is written as-is.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SinkError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(SinkError::io(path))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush().map_err(SinkError::io(path))?;
    Ok(())
}

fn csv_writer(path: &Path, headers: bool) -> Result<csv::Writer<File>, SinkError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(SinkError::io(path))?;
    Ok(csv::WriterBuilder::new()
        .has_headers(headers)
        .terminator(csv::Terminator::CRLF)
        .from_writer(file))
}

/// Header from the row type's field names. No rows writes an empty file.
pub fn write_csv_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), SinkError> {
    let mut w = csv_writer(path, true)?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush().map_err(SinkError::io(path))?;
    Ok(())
}

/// Bulk complaint CSV; the header is written even with no records.
pub fn write_complaint_csv(path: &Path, records: &[ComplaintRecord]) -> Result<(), SinkError> {
    let mut w = csv_writer(path, false)?;
    w.write_record(COMPLAINT_CSV_COLUMNS)?;
    for record in records {
        w.serialize(record.to_csv_row())?;
    }
    w.flush().map_err(SinkError::io(path))?;
    Ok(())
}

/// Save structured items as `<tag>_structured_<ts>.{json,csv}` under `out_dir`.
pub fn save_structured(
    items: &[StructuredItem],
    tag: &str,
    fmt: OutputFormat,
    out_dir: &Path,
) -> Result<OutputPaths, SinkError> {
    let base = base_name(&format!("{}_structured", sanitize_tag(tag)));
    let mut paths = OutputPaths::default();

    if fmt.wants_json() {
        let path = out_dir.join(format!("{base}.json"));
        write_json(&path, items)?;
        paths.json = Some(path);
    }
    if fmt.wants_csv() {
        let path = out_dir.join(format!("{base}.csv"));
        write_csv_rows(&path, items)?;
        paths.csv = Some(path);
    }
    info!(
        "saved {} structured items tag={} paths={:?}",
        items.len(),
        tag,
        paths
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_made_path_safe() {
        assert_eq!(sanitize_tag("众花 分期/退款"), "众花_分期_退款");
        assert_eq!(sanitize_tag("  "), "page");
        assert_eq!(sanitize_tag("../"), "page");
    }

    #[test]
    fn base_name_carries_timestamp() {
        let name = base_name("kw");
        assert!(name.starts_with("kw_"));
        assert_eq!(name.len(), "kw_".len() + "YYYYmmdd_HHMMSS".len());
    }

    #[test]
    fn empty_structured_csv_is_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = save_structured(&[], "kw", OutputFormat::Both, dir.path()).unwrap();
        let csv = std::fs::read_to_string(paths.csv.unwrap()).unwrap();
        assert!(csv.is_empty());
        let json = std::fs::read_to_string(paths.json.unwrap()).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn structured_csv_uses_crlf_and_field_order() {
        let dir = tempfile::tempdir().unwrap();
        let item = StructuredItem {
            date: "2024-03-05".into(),
            title: "标题".into(),
            summary: "a b".into(),
            object: "某公司".into(),
            demands: "退款".into(),
            href: "https://tousu.sina.com.cn/complaint/view/1/".into(),
        };
        let paths = save_structured(&[item], "kw", OutputFormat::Csv, dir.path()).unwrap();
        assert!(paths.json.is_none());
        let csv = std::fs::read_to_string(paths.csv.unwrap()).unwrap();
        let mut lines = csv.split("\r\n");
        assert_eq!(lines.next(), Some("date,title,summary,object,demands,href"));
        assert_eq!(
            lines.next(),
            Some("2024-03-05,标题,a b,某公司,退款,https://tousu.sina.com.cn/complaint/view/1/")
        );
    }

    #[test]
    fn complaint_csv_header_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("c.csv");
        write_complaint_csv(&path, &[]).unwrap();
        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            csv,
            "date,title,description,complaint_object,complaint_request,status,amount_list,source_file,block_index\r\n"
        );
    }
}
