//! EmbracePlus wearing-detection adapter
//!
//! Parses the per-minute `wearing-detection` CSV exports and maps each row to
//! a raw record whose value is the percentage of the minute the band was worn.

use crate::error::{RecordError, RecordErrorKind};
use crate::types::{ParticipantId, RawRecord, SampleValue};

use super::{column_index, csv_reader, parse_finite, record_line, ParsedRecords, RecordParser};

/// Samples at or above this wearing percentage count as worn
pub const DEFAULT_WORN_THRESHOLD_PCT: f64 = 50.0;

const UNIX_COLUMN: &str = "timestamp_unix";
const ISO_COLUMN: &str = "timestamp_iso";
const WEAR_COLUMN_HINT: &str = "wearing_detection_percentage";

/// Wearing-detection CSV parser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WearingDetectionParser {
    worn_threshold_pct: f64,
}

impl Default for WearingDetectionParser {
    fn default() -> Self {
        Self::new(DEFAULT_WORN_THRESHOLD_PCT)
    }
}

impl WearingDetectionParser {
    pub fn new(worn_threshold_pct: f64) -> Self {
        Self { worn_threshold_pct }
    }

    pub fn worn_threshold_pct(&self) -> f64 {
        self.worn_threshold_pct
    }
}

impl RecordParser for WearingDetectionParser {
    fn parse(&self, participant: &ParticipantId, text: &str) -> Result<ParsedRecords, String> {
        let mut reader = csv_reader(text, b',');
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();
        if headers.is_empty() {
            return Ok(ParsedRecords::default());
        }

        // Prefer the epoch column; the ISO column is a fallback for older exports
        let (ts_idx, ts_name) = match column_index(&headers, UNIX_COLUMN) {
            Some(idx) => (idx, UNIX_COLUMN),
            None => match column_index(&headers, ISO_COLUMN) {
                Some(idx) => (idx, ISO_COLUMN),
                None => {
                    return Err(format!(
                        "no '{}' or '{}' column",
                        UNIX_COLUMN, ISO_COLUMN
                    ))
                }
            },
        };

        let (wear_idx, wear_name) = headers
            .iter()
            .enumerate()
            .find(|(_, h)| h.to_lowercase().contains(WEAR_COLUMN_HINT))
            .map(|(idx, h)| (idx, h.to_string()))
            .ok_or_else(|| format!("no column containing '{}'", WEAR_COLUMN_HINT))?;

        let mut parsed = ParsedRecords::default();

        for row in reader.records() {
            let row = row.map_err(|e| e.to_string())?;
            let line = record_line(&row);

            let raw_timestamp = match row.get(ts_idx).filter(|s| !s.is_empty()) {
                Some(ts) => ts.to_string(),
                None => {
                    parsed.rejected.push(RecordError::new(
                        line,
                        ts_name,
                        "",
                        RecordErrorKind::MissingField,
                    ));
                    continue;
                }
            };

            let cell = row.get(wear_idx).unwrap_or("");
            let value = if cell.is_empty() {
                None
            } else {
                match parse_finite(cell) {
                    Some(pct) => Some(pct),
                    None => {
                        parsed.rejected.push(RecordError::new(
                            line,
                            &wear_name,
                            cell,
                            RecordErrorKind::Value,
                        ));
                        continue;
                    }
                }
            };

            parsed.records.push(RawRecord {
                participant_id: participant.clone(),
                line,
                raw_timestamp,
                value: value.map(SampleValue::Numeric),
                is_worn: value.is_some_and(|pct| pct >= self.worn_threshold_pct),
            });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn participant() -> ParticipantId {
        ParticipantId::new("HC_009")
    }

    #[test]
    fn test_parse_unix_column() {
        let csv = "timestamp_unix,timestamp_iso,wearing_detection_percentage\n\
                   1718000000000,2024-06-10T06:13:20Z,100\n\
                   1718000060000,2024-06-10T06:14:20Z,20\n";
        let parsed = WearingDetectionParser::default()
            .parse(&participant(), csv)
            .unwrap();

        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].raw_timestamp, "1718000000000");
        assert_eq!(parsed.records[0].line, 2);
        assert_eq!(parsed.records[0].value, Some(SampleValue::Numeric(100.0)));
        assert!(parsed.records[0].is_worn);
        assert!(!parsed.records[1].is_worn);
    }

    #[test]
    fn test_falls_back_to_iso_column() {
        let csv = "timestamp_iso,Wearing_Detection_Percentage_avg\n2024-06-10T06:13:20Z,75\n";
        let parsed = WearingDetectionParser::default()
            .parse(&participant(), csv)
            .unwrap();

        assert_eq!(parsed.records[0].raw_timestamp, "2024-06-10T06:13:20Z");
        assert!(parsed.records[0].is_worn);
    }

    #[test]
    fn test_missing_columns_is_structural_error() {
        let parser = WearingDetectionParser::default();
        assert!(parser
            .parse(&participant(), "time,wearing_detection_percentage\n1,2\n")
            .is_err());
        assert!(parser
            .parse(&participant(), "timestamp_unix,steps\n1,2\n")
            .is_err());
    }

    #[test]
    fn test_bad_rows_are_reported_not_dropped() {
        let csv = "timestamp_unix,wearing_detection_percentage\n\
                   1718000000,abc\n\
                   ,100\n\
                   1718000120,\n";
        let parsed = WearingDetectionParser::default()
            .parse(&participant(), csv)
            .unwrap();

        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].kind, RecordErrorKind::Value);
        assert_eq!(parsed.rejected[0].raw, "abc");
        assert_eq!(parsed.rejected[1].kind, RecordErrorKind::MissingField);
        assert_eq!(parsed.rejected[1].line, 3);

        // Empty percentage is kept as a non-worn sample with no value
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].value, None);
        assert!(!parsed.records[0].is_worn);
    }

    #[test]
    fn test_empty_source() {
        let parsed = WearingDetectionParser::default()
            .parse(&participant(), "")
            .unwrap();
        assert!(parsed.records.is_empty());
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_custom_threshold() {
        let csv = "timestamp_unix,wearing_detection_percentage\n1718000000,1\n";
        let parsed = WearingDetectionParser::new(1.0)
            .parse(&participant(), csv)
            .unwrap();
        assert!(parsed.records[0].is_worn);
    }
}
