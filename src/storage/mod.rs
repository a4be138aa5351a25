//! On-disk outputs: the streaming NDJSON log and the JSON/CSV writers.

pub mod stream_sink;
pub mod writers;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use stream_sink::{read_ndjson, StreamSink};
pub use writers::{
    base_name, sanitize_tag, save_structured, write_complaint_csv, write_csv_rows, write_json,
    OutputPaths,
};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

impl SinkError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
        move |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `create_dir_all` on the parent of `path`, if it has one.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(SinkError::io(parent)),
        None => Ok(()),
    }
}
