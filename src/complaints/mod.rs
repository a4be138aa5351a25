//! Complaint text dumps and scraped blobs into structured records.

pub mod normalize;
pub mod segment;
pub mod transform;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::types::ComplaintRecord;

pub use normalize::{
    classify_lines, extract_amounts, normalize_date, normalize_request, record_from_block,
};
pub use segment::{segment, RawBlock};
pub use transform::{filter_invalid, structured_from_item, transform_structured};

/// Parse a whole dump. `block_index` starts at 1.
pub fn parse_dump(dump: &str, source: &str) -> Vec<ComplaintRecord> {
    segment(dump)
        .iter()
        .enumerate()
        .map(|(idx, block)| record_from_block(block, source, idx + 1))
        .collect()
}

/// Read and parse a dump file, logging field coverage counts.
pub fn parse_file(path: &Path) -> Result<Vec<ComplaintRecord>> {
    let dump = std::fs::read_to_string(path)
        .with_context(|| format!("reading dump {}", path.display()))?;
    let records = parse_dump(&dump, &path.to_string_lossy());

    info!("records parsed: {}", records.len());
    info!(
        "records with object: {}",
        records.iter().filter(|r| !r.complaint_object.is_empty()).count()
    );
    info!(
        "records with request: {}",
        records.iter().filter(|r| !r.complaint_request.is_empty()).count()
    );
    info!(
        "records with status: {}",
        records
            .iter()
            .filter(|r| !r.status.as_str().is_empty())
            .count()
    );
    Ok(records)
}
