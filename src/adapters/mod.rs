//! Source parsing strategies
//!
//! This module provides parsers that read a modality's source text into raw,
//! not-yet-normalized records. Timestamp conversion happens afterwards in the
//! loader so every modality shares one normalization routine.

mod delimited;
mod wearing;

pub use delimited::{DelimitedParser, ValueKind};
pub use wearing::{WearingDetectionParser, DEFAULT_WORN_THRESHOLD_PCT};

use crate::error::RecordError;
use crate::types::{ParticipantId, RawRecord};

/// Records read from a source, plus the rows that could not be read
#[derive(Debug, Clone, Default)]
pub struct ParsedRecords {
    pub records: Vec<RawRecord>,
    pub rejected: Vec<RecordError>,
}

/// Trait for per-modality source parsers
pub trait RecordParser {
    /// Parse source text into raw records.
    ///
    /// Row-level problems go into `ParsedRecords::rejected`; `Err` is reserved
    /// for sources whose structure is unusable (e.g. missing required columns).
    fn parse(&self, participant: &ParticipantId, text: &str) -> Result<ParsedRecords, String>;
}

fn csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Parse a finite number, rejecting NaN and infinities
fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
