//! Core types for the streamdash pipeline
//!
//! This module defines the data structures that flow through each stage:
//! raw records read from a source, normalized samples with canonical timestamps,
//! and the per-bin summaries handed to the chart layer.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RecordError;

/// Participant identifier (the participant's folder name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Data modality collected for a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// EmbracePlus wristband wearing detection, aggregated per minute
    Wristband,
    /// Overnight EEG (Dreem) sessions
    Sleep,
    /// Daytime EEG meditation sessions
    Meditation,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Wristband => "wristband",
            Modality::Sleep => "sleep",
            Modality::Meditation => "meditation",
        }
    }

    /// Whether sources for this modality are per-sample time-series
    pub fn is_time_series(&self) -> bool {
        matches!(self, Modality::Wristband)
    }

    /// Interval between consecutive samples as written by the device export, if fixed
    pub fn nominal_sample_interval(&self) -> Option<Duration> {
        match self {
            Modality::Wristband => Some(Duration::minutes(1)),
            Modality::Sleep | Modality::Meditation => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reading's value; numeric for most modalities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Numeric(f64),
    Categorical(String),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Numeric(v) => Some(*v),
            SampleValue::Categorical(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            SampleValue::Numeric(_) => None,
            SampleValue::Categorical(c) => Some(c.as_str()),
        }
    }
}

/// One device reading exactly as it came out of the source
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub participant_id: ParticipantId,
    /// 1-based line in the source file
    pub line: u64,
    /// Timestamp text, format not yet known
    pub raw_timestamp: String,
    pub value: Option<SampleValue>,
    pub is_worn: bool,
}

/// A record whose timestamp has been converted to canonical wall time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSample {
    pub participant_id: ParticipantId,
    pub timestamp: NaiveDateTime,
    pub value: Option<SampleValue>,
    pub is_worn: bool,
    pub line: u64,
    /// Recording day the export was filed under, when the source layout has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_day: Option<String>,
}

/// Result of loading one participant's source(s) for a modality
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub participant_id: ParticipantId,
    pub modality: Modality,
    /// Samples ordered by timestamp (stable for equal timestamps)
    pub samples: Vec<NormalizedSample>,
    /// Records that could not be converted; the caller decides what to do with them
    pub rejected: Vec<RecordError>,
}

/// Numeric aggregates over the worn samples in a bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// One row of the summary table: a participant's data within one bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub participant_id: ParticipantId,
    /// Inclusive bin start
    pub bin_start: NaiveDateTime,
    /// Exclusive bin end
    pub bin_end: NaiveDateTime,
    /// Hours of the bin covered by worn samples, clipped to the bin width
    pub hours_worn: f64,
    pub sample_count: usize,
    pub worn_count: usize,
    /// `None` when no worn numeric sample fell into the bin
    pub stats: Option<ValueStats>,
    /// Most frequent categorical value among worn samples
    pub dominant_category: Option<String>,
}

impl BinSummary {
    /// True when the bin has no worn data to report
    pub fn is_gap(&self) -> bool {
        self.stats.is_none() && self.dominant_category.is_none()
    }
}

/// Binned view of one participant's modality, as handed to the chart layer
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityReport {
    pub participant_id: ParticipantId,
    pub modality: Modality,
    /// Number of source files read
    pub sources: usize,
    pub bins: Vec<BinSummary>,
    pub rejected: Vec<RecordError>,
}

impl ModalityReport {
    /// Report with no bins, for participants whose sources held no valid records
    pub fn empty(participant_id: ParticipantId, modality: Modality, rejected: Vec<RecordError>) -> Self {
        Self {
            participant_id,
            modality,
            sources: 0,
            bins: Vec::new(),
            rejected,
        }
    }

    pub fn total_hours_worn(&self) -> f64 {
        self.bins.iter().map(|b| b.hours_worn).sum()
    }
}
