//! Timestamp normalization
//!
//! Every modality shares this one routine for turning raw timestamp text into
//! canonical wall time. Formats are tried in a fixed priority order per record;
//! the first that parses wins. Nothing is remembered between records, so a file
//! mixing epoch and ISO timestamps normalizes correctly.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Epoch values above this magnitude are milliseconds, otherwise seconds
pub const MILLIS_THRESHOLD: f64 = 1e12;

const ISO_NAIVE_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Day-first patterns used by the study's locale exports
const DEFAULT_LOCALE_PATTERNS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// An accepted timestamp format
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Epoch number; unit picked by magnitude
    UnixAuto,
    UnixSeconds,
    UnixMillis,
    /// RFC 3339 with offset, or naive `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` / `YYYY-MM-DD`
    Iso8601,
    /// chrono strftime pattern, interpreted as wall time
    Pattern(String),
}

impl TimestampFormat {
    fn try_parse(&self, raw: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
        match self {
            TimestampFormat::UnixAuto => {
                let value = parse_epoch_number(raw)?;
                if value.abs() > MILLIS_THRESHOLD {
                    from_epoch_millis(value, offset)
                } else {
                    from_epoch_millis(value * 1000.0, offset)
                }
            }
            TimestampFormat::UnixSeconds => {
                from_epoch_millis(parse_epoch_number(raw)? * 1000.0, offset)
            }
            TimestampFormat::UnixMillis => from_epoch_millis(parse_epoch_number(raw)?, offset),
            TimestampFormat::Iso8601 => parse_iso(raw, offset),
            TimestampFormat::Pattern(pattern) => NaiveDateTime::parse_from_str(raw, pattern).ok(),
        }
    }
}

/// Converts raw timestamp text to canonical wall time in a fixed offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampNormalizer {
    formats: Vec<TimestampFormat>,
    offset: FixedOffset,
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        let mut formats = vec![TimestampFormat::UnixAuto, TimestampFormat::Iso8601];
        formats.extend(
            DEFAULT_LOCALE_PATTERNS
                .iter()
                .map(|p| TimestampFormat::Pattern((*p).to_string())),
        );
        Self {
            formats,
            offset: utc_offset(),
        }
    }
}

impl TimestampNormalizer {
    /// Create a normalizer with an explicit priority order, canonicalizing to UTC
    pub fn new(formats: Vec<TimestampFormat>) -> Self {
        Self {
            formats,
            offset: utc_offset(),
        }
    }

    /// Canonicalize absolute instants (epochs, offset-qualified ISO) into this offset
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn formats(&self) -> &[TimestampFormat] {
        &self.formats
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Normalize one timestamp; `None` if no accepted format matches
    pub fn normalize(&self, raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.formats
            .iter()
            .find_map(|format| format.try_parse(trimmed, &self.offset))
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn parse_epoch_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.parse().ok()?;
    value.is_finite().then_some(value)
}

fn from_epoch_millis(millis: f64, offset: &FixedOffset) -> Option<NaiveDateTime> {
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    let utc = DateTime::<Utc>::from_timestamp_millis(millis.round() as i64)?;
    Some(utc.with_timezone(offset).naive_local())
}

fn parse_iso(raw: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(offset).naive_local());
    }
    for pattern in ISO_NAIVE_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
