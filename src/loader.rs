//! Time-series loading
//!
//! Reads a participant's source through the modality's parser, normalizes every
//! timestamp independently and returns the samples in time order together with
//! the records that could not be converted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::adapters::{RecordParser, WearingDetectionParser};
use crate::error::{ComputeError, LoadError, RecordError, RecordErrorKind};
use crate::normalizer::TimestampNormalizer;
use crate::types::{LoadOutcome, Modality, NormalizedSample, ParticipantId};

/// Field name reported for timestamp failures
const TIMESTAMP_FIELD: &str = "timestamp";

/// Loader for one modality's time-series sources
pub struct TimeSeriesLoader {
    parser: Box<dyn RecordParser>,
    normalizer: TimestampNormalizer,
    strict: bool,
    source_day: Option<fn(&Path) -> Option<String>>,
}

impl TimeSeriesLoader {
    /// Create a loader with a custom parsing strategy and default normalizer
    pub fn new(parser: Box<dyn RecordParser>) -> Self {
        Self {
            parser,
            normalizer: TimestampNormalizer::default(),
            strict: false,
            source_day: None,
        }
    }

    /// Loader with the default parser for a time-series modality
    pub fn for_modality(modality: Modality) -> Result<Self, ComputeError> {
        match modality {
            Modality::Wristband => Ok(Self::new(Box::new(WearingDetectionParser::default()))),
            Modality::Sleep | Modality::Meditation => Err(ComputeError::UnsupportedModality(
                modality.as_str().to_string(),
            )),
        }
    }

    pub fn with_normalizer(mut self, normalizer: TimestampNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// In strict mode the first malformed record aborts the load
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Tag samples with the recording day derived from their source path
    pub fn with_source_day(mut self, day_of: fn(&Path) -> Option<String>) -> Self {
        self.source_day = Some(day_of);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Load one source file
    pub fn load(
        &self,
        participant: &ParticipantId,
        modality: Modality,
        path: &Path,
    ) -> Result<LoadOutcome, LoadError> {
        let text = read_source(path)?;
        let (samples, rejected) = self.convert(participant, path, &text)?;

        if samples.is_empty() {
            return Err(LoadError::EmptyResult {
                path: path.to_path_buf(),
                rejected,
            });
        }

        log::debug!(
            "loaded {} {} samples for {} from {} ({} rejected)",
            samples.len(),
            modality,
            participant,
            path.display(),
            rejected.len()
        );

        Ok(LoadOutcome {
            participant_id: participant.clone(),
            modality,
            samples,
            rejected,
        })
    }

    /// Load and merge several source files (e.g. one per recording day).
    ///
    /// Files that are individually empty are skipped; `EmptyResult` is returned
    /// only when the combined result has no samples.
    pub fn load_many(
        &self,
        participant: &ParticipantId,
        modality: Modality,
        paths: &[PathBuf],
    ) -> Result<LoadOutcome, LoadError> {
        let mut samples = Vec::new();
        let mut rejected = Vec::new();

        for path in paths {
            match self.load(participant, modality, path) {
                Ok(outcome) => {
                    samples.extend(outcome.samples);
                    rejected.extend(outcome.rejected);
                }
                Err(LoadError::EmptyResult {
                    path,
                    rejected: file_rejected,
                }) => {
                    log::warn!("no valid {} records in {}", modality, path.display());
                    rejected.extend(file_rejected);
                }
                Err(e) => return Err(e),
            }
        }

        if samples.is_empty() {
            let path = paths.first().cloned().unwrap_or_default();
            return Err(LoadError::EmptyResult { path, rejected });
        }

        samples.sort_by_key(|s: &NormalizedSample| s.timestamp);

        Ok(LoadOutcome {
            participant_id: participant.clone(),
            modality,
            samples,
            rejected,
        })
    }

    fn convert(
        &self,
        participant: &ParticipantId,
        path: &Path,
        text: &str,
    ) -> Result<(Vec<NormalizedSample>, Vec<RecordError>), LoadError> {
        let parsed = self
            .parser
            .parse(participant, text)
            .map_err(|message| LoadError::Malformed {
                path: path.to_path_buf(),
                message,
            })?;

        let mut rejected = parsed.rejected;
        let source_day = self.source_day.and_then(|day_of| day_of(path));
        let mut samples = Vec::with_capacity(parsed.records.len());
        for record in parsed.records {
            match self.normalizer.normalize(&record.raw_timestamp) {
                Some(timestamp) => samples.push(NormalizedSample {
                    participant_id: record.participant_id,
                    timestamp,
                    value: record.value,
                    is_worn: record.is_worn,
                    line: record.line,
                    source_day: source_day.clone(),
                }),
                None => rejected.push(RecordError::new(
                    record.line,
                    TIMESTAMP_FIELD,
                    &record.raw_timestamp,
                    RecordErrorKind::Timestamp,
                )),
            }
        }

        // Parser rejections and timestamp rejections interleave; report by line
        rejected.sort_by_key(|e| e.line);

        // Only after sorting, so strict mode stops at the earliest bad line
        if self.strict {
            if let Some(first) = rejected.first() {
                return Err(LoadError::Parse(first.clone()));
            }
        }

        for error in &rejected {
            log::warn!("{}: skipping record, {}", path.display(), error);
        }

        // Stable: equal timestamps keep source order, duplicates are kept
        samples.sort_by_key(|s| s.timestamp);

        Ok((samples, rejected))
    }
}

fn read_source(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::FileNotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DelimitedParser, ValueKind};
    use crate::test_support::TempDir;
    use crate::types::SampleValue;
    use chrono::NaiveDate;

    const HEADER: &str = "timestamp_unix,wearing_detection_percentage\n";

    fn participant() -> ParticipantId {
        ParticipantId::new("HC_009")
    }

    #[test]
    fn test_load_sorts_and_keeps_duplicates() {
        let dir = TempDir::new("loader_sort");
        let path = dir.write(
            "wear.csv",
            &format!("{HEADER}1718000120,100\n1718000000,100\n1718000120,0\n"),
        );

        let outcome = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load(&participant(), Modality::Wristband, &path)
            .unwrap();

        let lines: Vec<u64> = outcome.samples.iter().map(|s| s.line).collect();
        // Stable sort: the two 1718000120 rows keep file order (lines 2 then 4)
        assert_eq!(lines, vec![3, 2, 4]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_mixed_formats_in_one_file() {
        let dir = TempDir::new("loader_mixed");
        let parser = DelimitedParser::new("ts").with_value_column("v", ValueKind::Numeric);
        let path = dir.write(
            "mixed.csv",
            "ts,v\n2024-01-15T08:00:00Z,1\n1705306500,2\n1705306560000,3\n15.01.2024 08:17:00,4\n",
        );

        let outcome = TimeSeriesLoader::new(Box::new(parser))
            .load(&participant(), Modality::Wristband, &path)
            .unwrap();

        let base = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let minutes: Vec<i64> = outcome
            .samples
            .iter()
            .map(|s| (s.timestamp - base).num_minutes())
            .collect();
        assert_eq!(minutes, vec![0, 15, 16, 17]);
        assert_eq!(outcome.samples[3].value, Some(SampleValue::Numeric(4.0)));
    }

    #[test]
    fn test_bad_timestamps_collected() {
        let dir = TempDir::new("loader_collect");
        let path = dir.write(
            "wear.csv",
            &format!("{HEADER}1718000000,100\nnot-a-time,100\n1718000060,oops\n"),
        );

        let outcome = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load(&participant(), Modality::Wristband, &path)
            .unwrap();

        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].line, 3);
        assert_eq!(outcome.rejected[0].kind, RecordErrorKind::Timestamp);
        assert_eq!(outcome.rejected[1].kind, RecordErrorKind::Value);
    }

    #[test]
    fn test_strict_mode_aborts() {
        let dir = TempDir::new("loader_strict");
        let path = dir.write("wear.csv", &format!("{HEADER}1718000000,100\nnope,100\n"));

        let err = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .strict(true)
            .load(&participant(), Modality::Wristband, &path)
            .unwrap_err();

        match err {
            LoadError::Parse(record) => {
                assert_eq!(record.line, 3);
                assert_eq!(record.raw, "nope");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_mode_stops_at_earliest_line() {
        let dir = TempDir::new("loader_strict_order");
        // Timestamp failure on line 2 comes before the value failure on line 3
        let path = dir.write("wear.csv", &format!("{HEADER}nope,100\n1718000000,abc\n"));

        let err = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .strict(true)
            .load(&participant(), Modality::Wristband, &path)
            .unwrap_err();

        match err {
            LoadError::Parse(record) => {
                assert_eq!(record.line, 2);
                assert_eq!(record.kind, RecordErrorKind::Timestamp);
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_source_day_tagging() {
        let dir = TempDir::new("loader_day");
        let path = dir.write("2024-06-10/wear.csv", &format!("{HEADER}1718000000,100\n"));
        fn parent_name(path: &Path) -> Option<String> {
            path.parent()?.file_name().map(|n| n.to_string_lossy().into_owned())
        }

        let outcome = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .with_source_day(parent_name)
            .load(&participant(), Modality::Wristband, &path)
            .unwrap();

        assert_eq!(outcome.samples[0].source_day.as_deref(), Some("2024-06-10"));
    }

    #[test]
    fn test_empty_file_is_empty_result() {
        let dir = TempDir::new("loader_empty");
        let empty = dir.write("empty.csv", "");
        let header_only = dir.write("header.csv", HEADER);
        let loader = TimeSeriesLoader::for_modality(Modality::Wristband).unwrap();

        for path in [empty, header_only] {
            let err = loader
                .load(&participant(), Modality::Wristband, &path)
                .unwrap_err();
            assert!(matches!(err, LoadError::EmptyResult { .. }));
        }
    }

    #[test]
    fn test_all_rows_bad_is_empty_result_with_rejections() {
        let dir = TempDir::new("loader_all_bad");
        let path = dir.write("wear.csv", &format!("{HEADER}x,1\ny,2\n"));

        let err = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load(&participant(), Modality::Wristband, &path)
            .unwrap_err();

        match err {
            LoadError::EmptyResult { rejected, .. } => assert_eq!(rejected.len(), 2),
            other => panic!("expected EmptyResult, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new("loader_missing");
        let err = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load(&participant(), Modality::Wristband, &dir.path().join("nope.csv"))
            .unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn test_malformed_source() {
        let dir = TempDir::new("loader_malformed");
        let path = dir.write("wear.csv", "a,b\n1,2\n");
        let err = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load(&participant(), Modality::Wristband, &path)
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_load_many_merges_and_skips_empty() {
        let dir = TempDir::new("loader_many");
        let day2 = dir.write("day2.csv", &format!("{HEADER}1718086400,100\n"));
        let empty = dir.write("empty.csv", HEADER);
        let day1 = dir.write("day1.csv", &format!("{HEADER}1718000000,100\n"));

        let outcome = TimeSeriesLoader::for_modality(Modality::Wristband)
            .unwrap()
            .load_many(&participant(), Modality::Wristband, &[day2, empty, day1])
            .unwrap();

        assert_eq!(outcome.samples.len(), 2);
        assert!(outcome.samples[0].timestamp < outcome.samples[1].timestamp);
    }

    #[test]
    fn test_report_modalities_have_no_loader() {
        assert!(matches!(
            TimeSeriesLoader::for_modality(Modality::Sleep),
            Err(ComputeError::UnsupportedModality(_))
        ));
    }
}
