//! Table encoding
//!
//! This module encodes bin summaries into the tabular form the chart layer
//! consumes: one row per bin with named columns. Undefined aggregates become
//! empty CSV cells or JSON `null`, never zero.

use serde::Serialize;

use crate::error::ComputeError;
use crate::summary::{DailyWearing, WearingBand};
use crate::types::{BinSummary, NormalizedSample};

/// Timestamp layout used in encoded tables
pub const TABLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One encoded row of the summary table
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    participant_id: &'a str,
    bin_start: String,
    bin_end: String,
    hours_worn: f64,
    sample_count: usize,
    worn_count: usize,
    mean: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    dominant_category: Option<&'a str>,
}

/// Encoder producing CSV / JSON tables
pub struct TableEncoder {
    time_format: String,
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableEncoder {
    pub fn new() -> Self {
        Self {
            time_format: TABLE_TIME_FORMAT.to_string(),
        }
    }

    /// Encoder with a custom strftime layout for time columns
    pub fn with_time_format(time_format: impl Into<String>) -> Self {
        Self {
            time_format: time_format.into(),
        }
    }

    fn rows<'a>(&self, bins: &'a [BinSummary]) -> Vec<SummaryRow<'a>> {
        bins.iter()
            .map(|bin| SummaryRow {
                participant_id: bin.participant_id.as_str(),
                bin_start: bin.bin_start.format(&self.time_format).to_string(),
                bin_end: bin.bin_end.format(&self.time_format).to_string(),
                hours_worn: bin.hours_worn,
                sample_count: bin.sample_count,
                worn_count: bin.worn_count,
                mean: bin.stats.map(|s| s.mean),
                min: bin.stats.map(|s| s.min),
                max: bin.stats.map(|s| s.max),
                dominant_category: bin.dominant_category.as_deref(),
            })
            .collect()
    }

    /// Encode bins as CSV with a header row
    pub fn to_csv(&self, bins: &[BinSummary]) -> Result<String, ComputeError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in self.rows(bins) {
            writer.serialize(row)?;
        }
        into_string(writer)
    }

    /// Encode bins as a JSON array of row objects
    pub fn to_json(&self, bins: &[BinSummary], pretty: bool) -> Result<String, ComputeError> {
        let rows = self.rows(bins);
        let json = if pretty {
            serde_json::to_string_pretty(&rows)?
        } else {
            serde_json::to_string(&rows)?
        };
        Ok(json)
    }

    /// Encode the per-day wearing band table (`Day` plus one column per band)
    pub fn bands_to_csv(&self, table: &[DailyWearing]) -> Result<String, ComputeError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["Day".to_string()];
        header.extend(WearingBand::ALL.iter().map(|b| b.label().to_string()));
        writer.write_record(&header)?;

        for day in table {
            let mut record = vec![day.day.clone()];
            record.extend(
                WearingBand::ALL
                    .iter()
                    .map(|b| day.hours.get(b).copied().unwrap_or(0.0).to_string()),
            );
            writer.write_record(&record)?;
        }
        into_string(writer)
    }

    /// Encode samples as newline-delimited JSON
    pub fn samples_to_ndjson(&self, samples: &[NormalizedSample]) -> Result<String, ComputeError> {
        let mut out = String::new();
        for sample in samples {
            out.push_str(&serde_json::to_string(sample)?);
            out.push('\n');
        }
        Ok(out)
    }
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ComputeError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ComputeError::EncodingError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ComputeError::EncodingError(e.to_string()))
}
