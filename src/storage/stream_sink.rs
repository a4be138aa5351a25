use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::writers::{base_name, write_json, OutputPaths};
use super::{ensure_parent, SinkError};
use crate::collect::ItemSink;
use crate::core::types::{LoggedItem, OutputFormat, RawItem};

/// Append-only incremental log of newly-seen items.
///
/// Every append goes to `<base>.ndjson` (one `{title,content,time,href,keyword}`
/// object per line) and, when CSV output is requested, to `<base>.csv`.
/// [`StreamSink::finalize`] compacts the log into `<base>.json`.
pub struct StreamSink {
    ndjson_path: PathBuf,
    json_path: Option<PathBuf>,
    csv: Option<(PathBuf, csv::Writer<File>)>,
    appended: usize,
}

impl StreamSink {
    pub fn create(out_dir: &Path, tag: &str, fmt: OutputFormat) -> Result<Self, SinkError> {
        let base = base_name(tag);
        let ndjson_path = out_dir.join(format!("{base}.ndjson"));
        ensure_parent(&ndjson_path)?;
        File::create(&ndjson_path).map_err(SinkError::io(&ndjson_path))?;

        let json_path = fmt
            .wants_json()
            .then(|| out_dir.join(format!("{base}.json")));

        let csv = if fmt.wants_csv() {
            let path = out_dir.join(format!("{base}.csv"));
            let file = File::create(&path).map_err(SinkError::io(&path))?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::CRLF)
                .from_writer(file);
            writer.write_record(["title", "content", "time", "href", "keyword"])?;
            writer.flush().map_err(SinkError::io(&path))?;
            Some((path, writer))
        } else {
            None
        };

        info!("stream sink opened at {}", ndjson_path.display());
        Ok(Self {
            ndjson_path,
            json_path,
            csv,
            appended: 0,
        })
    }

    pub fn ndjson_path(&self) -> &Path {
        &self.ndjson_path
    }

    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Compact the log into the JSON array and return the produced paths.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub fn finalize(mut self) -> Result<OutputPaths, SinkError> {
        let csv_path = match self.csv.take() {
            Some((path, mut writer)) => {
                writer.flush().map_err(SinkError::io(&path))?;
                Some(path)
            }
            None => None,
        };

        let Some(json_path) = self.json_path else {
            return Ok(OutputPaths {
                json: None,
                csv: csv_path,
            });
        };

        let recovered = read_ndjson(&self.ndjson_path)?;
        write_json(&json_path, &recovered)?;
        info!(
            "stream sink finalized {} records into {}",
            recovered.len(),
            json_path.display()
        );
        Ok(OutputPaths {
            json: Some(json_path),
            csv: csv_path,
        })
    }
}

impl ItemSink for StreamSink {
    fn append(&mut self, items: &[RawItem], keyword: &str) -> Result<(), SinkError> {
        if items.is_empty() {
            return Ok(());
        }

        let path = &self.ndjson_path;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(SinkError::io(path))?;
        let mut out = std::io::BufWriter::new(file);
        for item in items {
            serde_json::to_writer(&mut out, &LoggedItem::new(item, keyword))?;
            out.write_all(b"\n").map_err(SinkError::io(path))?;
        }
        out.flush().map_err(SinkError::io(path))?;

        if let Some((csv_path, writer)) = self.csv.as_mut() {
            for item in items {
                writer.serialize(LoggedItem::new(item, keyword))?;
            }
            writer.flush().map_err(SinkError::io(csv_path))?;
        }

        self.appended += items.len();
        Ok(())
    }
}

/// Every parseable line of an NDJSON file; blank, malformed and non-UTF-8
/// lines are skipped.
pub fn read_ndjson(path: &Path) -> Result<Vec<serde_json::Value>, SinkError> {
    let file = File::open(path).map_err(SinkError::io(path))?;
    let mut recovered = Vec::new();
    for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw.map_err(SinkError::io(path))?;
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(
                    "skipping undecodable line {} of {}: {}",
                    idx + 1,
                    path.display(),
                    e
                );
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => recovered.push(value),
            Err(e) => warn!(
                "skipping malformed line {} of {}: {}",
                idx + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(recovered)
}
