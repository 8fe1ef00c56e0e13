//! Generic delimited-text adapter
//!
//! For modalities without a dedicated parser: the caller names the timestamp,
//! value and (optionally) worn columns of a delimited export.

use crate::error::{RecordError, RecordErrorKind};
use crate::types::{ParticipantId, RawRecord, SampleValue};

use super::{column_index, csv_reader, parse_finite, record_line, ParsedRecords, RecordParser};

/// How to interpret the value column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    Categorical,
}

/// Column-mapped delimited text parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedParser {
    delimiter: u8,
    timestamp_column: String,
    value_column: Option<String>,
    worn_column: Option<String>,
    value_kind: ValueKind,
}

impl DelimitedParser {
    /// Comma-delimited parser reading timestamps from `timestamp_column`
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            delimiter: b',',
            timestamp_column: timestamp_column.into(),
            value_column: None,
            worn_column: None,
            value_kind: ValueKind::Numeric,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_value_column(mut self, column: impl Into<String>, kind: ValueKind) -> Self {
        self.value_column = Some(column.into());
        self.value_kind = kind;
        self
    }

    /// Without a worn column every record is treated as worn
    pub fn with_worn_column(mut self, column: impl Into<String>) -> Self {
        self.worn_column = Some(column.into());
        self
    }

    fn parse_value(&self, cell: &str) -> Option<SampleValue> {
        match self.value_kind {
            ValueKind::Numeric => parse_finite(cell).map(SampleValue::Numeric),
            ValueKind::Categorical => Some(SampleValue::Categorical(cell.to_string())),
        }
    }
}

fn parse_worn_flag(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

impl RecordParser for DelimitedParser {
    fn parse(&self, participant: &ParticipantId, text: &str) -> Result<ParsedRecords, String> {
        let mut reader = csv_reader(text, self.delimiter);
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();
        if headers.is_empty() {
            return Ok(ParsedRecords::default());
        }

        let require = |name: &str| {
            column_index(&headers, name).ok_or_else(|| format!("no '{}' column", name))
        };
        let ts_idx = require(&self.timestamp_column)?;
        let value_idx = self.value_column.as_deref().map(require).transpose()?;
        let worn_idx = self.worn_column.as_deref().map(require).transpose()?;

        let mut parsed = ParsedRecords::default();

        for row in reader.records() {
            let row = row.map_err(|e| e.to_string())?;
            let line = record_line(&row);

            let raw_timestamp = match row.get(ts_idx).filter(|s| !s.is_empty()) {
                Some(ts) => ts.to_string(),
                None => {
                    parsed.rejected.push(RecordError::new(
                        line,
                        &self.timestamp_column,
                        "",
                        RecordErrorKind::MissingField,
                    ));
                    continue;
                }
            };

            let value = match (value_idx, self.value_column.as_deref()) {
                (Some(idx), Some(name)) => {
                    let cell = row.get(idx).unwrap_or("");
                    if cell.is_empty() {
                        None
                    } else {
                        match self.parse_value(cell) {
                            Some(v) => Some(v),
                            None => {
                                parsed.rejected.push(RecordError::new(
                                    line,
                                    name,
                                    cell,
                                    RecordErrorKind::Value,
                                ));
                                continue;
                            }
                        }
                    }
                }
                _ => None,
            };

            let is_worn = match (worn_idx, self.worn_column.as_deref()) {
                (Some(idx), Some(name)) => {
                    let cell = row.get(idx).unwrap_or("");
                    match parse_worn_flag(cell) {
                        Some(flag) => flag,
                        None => {
                            parsed.rejected.push(RecordError::new(
                                line,
                                name,
                                cell,
                                RecordErrorKind::Value,
                            ));
                            continue;
                        }
                    }
                }
                _ => true,
            };

            parsed.records.push(RawRecord {
                participant_id: participant.clone(),
                line,
                raw_timestamp,
                value,
                is_worn,
            });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semicolon_with_worn_flags() {
        let parser = DelimitedParser::new("time")
            .with_delimiter(b';')
            .with_value_column("hr", ValueKind::Numeric)
            .with_worn_column("on_wrist");
        let text = "time;hr;on_wrist\n2024-01-15 08:00:00;62;yes\n2024-01-15 08:01:00;;0\n";

        let parsed = parser.parse(&ParticipantId::new("P1"), text).unwrap();

        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].value, Some(SampleValue::Numeric(62.0)));
        assert!(parsed.records[0].is_worn);
        assert_eq!(parsed.records[1].value, None);
        assert!(!parsed.records[1].is_worn);
    }

    #[test]
    fn test_categorical_values_and_inferred_worn() {
        let parser = DelimitedParser::new("ts").with_value_column("stage", ValueKind::Categorical);
        let text = "ts,stage\n1718000000,REM\n1718000030,Deep\n";

        let parsed = parser.parse(&ParticipantId::new("P1"), text).unwrap();

        assert_eq!(
            parsed.records[1].value,
            Some(SampleValue::Categorical("Deep".to_string()))
        );
        assert!(parsed.records.iter().all(|r| r.is_worn));
    }

    #[test]
    fn test_invalid_worn_flag_rejected() {
        let parser = DelimitedParser::new("ts").with_worn_column("worn");
        let text = "ts,worn\n1718000000,maybe\n1718000060,true\n";

        let parsed = parser.parse(&ParticipantId::new("P1"), text).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].field, "worn");
        assert_eq!(parsed.rejected[0].raw, "maybe");
    }

    #[test]
    fn test_missing_configured_column() {
        let parser = DelimitedParser::new("ts").with_value_column("hr", ValueKind::Numeric);
        let err = parser
            .parse(&ParticipantId::new("P1"), "ts,bpm\n1,60\n")
            .unwrap_err();
        assert!(err.contains("hr"));
    }
}
