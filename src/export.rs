//! Flat exports of a harvest for the presentation layer.

use std::io::Write;
use thiserror::Error;

use crate::model::{HarvestResult, HarvestedRecord};

pub const CSV_HEADERS: [&str; 5] = ["title", "username", "link", "media_url", "media_kind"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error during export: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one row per record in record order. Absent values are empty cells.
pub fn write_csv<W: Write>(records: &[HarvestedRecord], writer: W) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADERS)?;
    for record in records {
        out.write_record([
            record.title.as_str(),
            record.username.as_deref().unwrap_or(""),
            record.link.as_str(),
            record.media.url.as_deref().unwrap_or(""),
            record.media.kind.as_str(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_csv_string(records: &[HarvestedRecord]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}

pub fn to_json(result: &HarvestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}
