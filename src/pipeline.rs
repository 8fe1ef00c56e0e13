//! Pipeline orchestration
//!
//! This module provides the public API for streamdash.
//! It ties participant discovery, loading, binning and encoding together:
//! participant directory → TimeSeriesLoader → BinAggregator → TableEncoder.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::aggregator::BinAggregator;
use crate::cache::{CacheKey, CacheStats, SummaryCache};
use crate::config::BinConfig;
use crate::encoder::TableEncoder;
use crate::error::{ComputeError, LoadError};
use crate::loader::TimeSeriesLoader;
use crate::normalizer::TimestampNormalizer;
use crate::participants::{export_day, ParticipantDirectory};
use crate::recordings::{load_recordings, summarize_recordings, Recording, RecordingKind, RecordingSummary};
use crate::subjective::{load_diaries, DiaryEntry};
use crate::summary::{hours_per_band, summarize_collection, CollectionSummary, DailyWearing};
use crate::types::{LoadOutcome, Modality, ModalityReport, ParticipantId};

/// Bin a single wristband export and encode the table as CSV.
///
/// # Arguments
/// * `path` - A `wearing-detection` CSV export
/// * `participant` - Participant the export belongs to
/// * `config` - Binning parameters
///
/// # Example
/// ```ignore
/// let config = BinConfig::hourly(Duration::minutes(1))?;
/// let csv = wristband_summary_table(Path::new("wear.csv"), &"HC_009".into(), &config)?;
/// ```
pub fn wristband_summary_table(
    path: &Path,
    participant: &ParticipantId,
    config: &BinConfig,
) -> Result<String, ComputeError> {
    let outcome = TimeSeriesLoader::for_modality(Modality::Wristband)?.load(
        participant,
        Modality::Wristband,
        path,
    )?;
    let bins = BinAggregator::aggregate(&outcome.samples, config)?;
    TableEncoder::new().to_csv(&bins)
}

/// Everything the overview page shows for one participant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantOverview {
    pub participant_id: ParticipantId,
    pub wristband: CollectionSummary,
    pub wearing_bands: Vec<DailyWearing>,
    pub sleep: RecordingSummary,
    pub meditation: RecordingSummary,
    pub sleep_sessions: Vec<Recording>,
    pub meditation_sessions: Vec<Recording>,
    pub diaries: Vec<DiaryEntry>,
}

/// Stateful processor that owns the summary cache.
///
/// Use this when the same participants are summarized repeatedly, e.g. behind
/// an interactive view.
pub struct SummaryProcessor {
    directory: ParticipantDirectory,
    config: BinConfig,
    normalizer: TimestampNormalizer,
    strict: bool,
    cache: SummaryCache,
}

impl SummaryProcessor {
    /// Create a processor over a data directory
    pub fn new(data_dir: impl Into<PathBuf>, config: BinConfig) -> Self {
        Self {
            directory: ParticipantDirectory::new(data_dir),
            config,
            normalizer: TimestampNormalizer::default(),
            strict: false,
            cache: SummaryCache::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: TimestampNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Abort on the first malformed record instead of collecting rejections
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn directory(&self) -> &ParticipantDirectory {
        &self.directory
    }

    pub fn config(&self) -> &BinConfig {
        &self.config
    }

    /// Switch binning parameters; reports for the old config stay cached
    pub fn set_config(&mut self, config: BinConfig) {
        self.config = config;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Forget cached reports, e.g. after new exports landed on disk
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn invalidate_participant(&mut self, participant: &ParticipantId) -> usize {
        self.cache.remove_participant(participant)
    }

    pub fn participants(&self) -> Result<BTreeSet<ParticipantId>, ComputeError> {
        Ok(self.directory.list_participants()?)
    }

    /// Load every source of a time-series modality for a participant
    pub fn load_samples(
        &self,
        participant: &ParticipantId,
        modality: Modality,
    ) -> Result<LoadOutcome, ComputeError> {
        let loader = self.loader(modality)?;
        let sources = self.directory.resolve_sources(participant, modality)?;
        Ok(loader.load_many(participant, modality, &sources)?)
    }

    /// Binned report for a participant's modality, served from cache when possible.
    ///
    /// Sources without any valid record give an empty report rather than an error.
    pub fn summarize(
        &mut self,
        participant: &ParticipantId,
        modality: Modality,
    ) -> Result<Arc<ModalityReport>, ComputeError> {
        let key = CacheKey::new(participant.clone(), modality, self.config, self.strict);

        let directory = &self.directory;
        let config = &self.config;
        let loader = self.loader(modality)?;

        self.cache.get_or_try_insert_with(key, || -> Result<ModalityReport, ComputeError> {
            let sources = directory.resolve_sources(participant, modality)?;
            let outcome = match loader.load_many(participant, modality, &sources) {
                Ok(outcome) => outcome,
                Err(LoadError::EmptyResult { path, rejected }) => {
                    log::info!(
                        "no valid {} data for {} (first source {}), rendering empty",
                        modality,
                        participant,
                        path.display()
                    );
                    return Ok(ModalityReport {
                        sources: sources.len(),
                        ..ModalityReport::empty(participant.clone(), modality, rejected)
                    });
                }
                Err(e) => return Err(ComputeError::from(e)),
            };

            let bins = BinAggregator::aggregate(&outcome.samples, config)?;
            log::debug!(
                "{} {} bins for {} from {} samples",
                bins.len(),
                modality,
                participant,
                outcome.samples.len()
            );

            Ok(ModalityReport {
                participant_id: participant.clone(),
                modality,
                sources: sources.len(),
                bins,
                rejected: outcome.rejected,
            })
        })
    }

    /// Collection summary, wearing band table, EEG sessions and diaries for a participant.
    ///
    /// Modalities without sources contribute zeros.
    pub fn overview(&self, participant: &ParticipantId) -> Result<ParticipantOverview, ComputeError> {
        let (wristband, wearing_bands) = match self.load_samples(participant, Modality::Wristband) {
            Ok(outcome) => (
                summarize_collection(&outcome.samples),
                hours_per_band(&outcome.samples),
            ),
            Err(ComputeError::Load(LoadError::FileNotFound(_)))
            | Err(ComputeError::Load(LoadError::EmptyResult { .. })) => {
                (CollectionSummary::default(), Vec::new())
            }
            Err(e) => return Err(e),
        };

        let sleep_sessions = self.recordings(participant, RecordingKind::Sleep)?;
        let meditation_sessions = self.recordings(participant, RecordingKind::Meditation)?;
        let diaries = self.diaries(participant)?;

        Ok(ParticipantOverview {
            participant_id: participant.clone(),
            wristband,
            wearing_bands,
            sleep: summarize_recordings(&sleep_sessions),
            meditation: summarize_recordings(&meditation_sessions),
            sleep_sessions,
            meditation_sessions,
            diaries,
        })
    }

    /// Diary sections of every app workbook, four per workbook
    pub fn diaries(&self, participant: &ParticipantId) -> Result<Vec<DiaryEntry>, ComputeError> {
        let files = self.directory.diary_workbooks(participant)?;
        Ok(load_diaries(participant, &files, &self.normalizer))
    }

    /// EEG sessions of one kind, in start order; empty when there are no reports
    pub fn recordings(
        &self,
        participant: &ParticipantId,
        kind: RecordingKind,
    ) -> Result<Vec<Recording>, ComputeError> {
        let files = match self.directory.resolve_sources(participant, kind.modality()) {
            Ok(files) => files,
            Err(LoadError::FileNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(load_recordings(
            kind,
            &self.directory.participant_dir(participant),
            &files,
            &self.normalizer,
        ))
    }

    fn loader(&self, modality: Modality) -> Result<TimeSeriesLoader, ComputeError> {
        Ok(TimeSeriesLoader::for_modality(modality)?
            .with_normalizer(self.normalizer.clone())
            .with_source_day(export_day)
            .strict(self.strict))
    }
}
