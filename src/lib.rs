//! streamdash - wearable study data summarization engine
//!
//! streamdash turns per-participant device exports into the binned tables a
//! study dashboard charts, through a deterministic pipeline: source resolution
//! → parsing → timestamp normalization → time binning → table encoding.
//!
//! ## Modules
//!
//! - **Time-series pipeline**: wristband wearing-detection exports binned into
//!   `BinSummary` rows (hours worn, value statistics)
//! - **Overview**: collection totals, wearing-percentage bands, EEG
//!   sleep/meditation sessions and app diary coverage per participant

pub mod adapters;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod participants;
pub mod pipeline;
pub mod recordings;
pub mod subjective;
pub mod summary;
pub mod types;

#[cfg(test)]
mod test_support;

pub use aggregator::BinAggregator;
pub use config::BinConfig;
pub use error::{ComputeError, ConfigError, LoadError, RecordError};
pub use loader::TimeSeriesLoader;
pub use normalizer::TimestampNormalizer;
pub use pipeline::{wristband_summary_table, ParticipantOverview, SummaryProcessor};
pub use types::{BinSummary, Modality, ModalityReport, NormalizedSample, ParticipantId};

/// streamdash version, reported by the CLI
pub const STREAMDASH_VERSION: &str = env!("CARGO_PKG_VERSION");
