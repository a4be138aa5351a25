use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::complaints::transform_structured;
use crate::core::types::{OutputFormat, RawItem};
use crate::storage::{save_structured, OutputPaths};

/// Read a JSON array of scraped items and save its structured form to `out_dir`.
///
/// The output tag is the input file stem.
pub fn transform_file(
    path: &Path,
    fmt: OutputFormat,
    out_dir: &Path,
    origin: &str,
) -> Result<OutputPaths> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if !value.is_array() {
        bail!("expected a JSON array of items in {}", path.display());
    }
    let items: Vec<RawItem> = serde_json::from_value(value)
        .with_context(|| format!("unexpected item shape in {}", path.display()))?;

    let structured = transform_structured(&items, origin);
    let tag = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    info!(
        "transform {} items={} fmt={:?}",
        path.display(),
        structured.len(),
        fmt
    );
    Ok(save_structured(&structured, &tag, fmt, out_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://tousu.sina.com.cn";

    #[test]
    fn transforms_finalized_stream_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("众花_20240101_000000.json");
        std::fs::write(
            &input,
            r#"[{"title":"2024-03-05 于黑猫投诉平台发起\n标题\n[投诉要求]退钱","content":"","time":"","href":"/complaint/view/1/","keyword":"众花"}]"#,
        )
        .unwrap();

        let paths = transform_file(&input, OutputFormat::Json, dir.path(), ORIGIN).unwrap();
        let out: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
        assert_eq!(out[0]["date"], "2024-03-05");
        assert_eq!(out[0]["title"], "标题");
        assert_eq!(out[0]["demands"], "退款");
        assert_eq!(out[0]["href"], "https://tousu.sina.com.cn/complaint/view/1/");
        assert!(paths.csv.is_none());
    }

    #[test]
    fn rejects_missing_and_non_array_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(transform_file(&dir.path().join("nope.json"), OutputFormat::Both, dir.path(), ORIGIN).is_err());

        let obj = dir.path().join("obj.json");
        std::fs::write(&obj, r#"{"title":"x"}"#).unwrap();
        let err = transform_file(&obj, OutputFormat::Both, dir.path(), ORIGIN).unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }
}
