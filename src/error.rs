//! Error types for streamdash

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which part of a record could not be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorKind {
    Timestamp,
    Value,
    MissingField,
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordErrorKind::Timestamp => "unparseable timestamp",
            RecordErrorKind::Value => "unparseable value",
            RecordErrorKind::MissingField => "missing field",
        };
        f.write_str(s)
    }
}

/// A single malformed record, reported instead of silently dropped
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("line {line}: {kind} in '{field}': {raw:?}")]
pub struct RecordError {
    /// 1-based line in the source file
    pub line: u64,
    /// Column or key the bad text came from
    pub field: String,
    /// Text as read from the source
    pub raw: String,
    pub kind: RecordErrorKind,
}

impl RecordError {
    pub fn new(line: u64, field: &str, raw: &str, kind: RecordErrorKind) -> Self {
        Self {
            line,
            field: field.to_string(),
            raw: raw.to_string(),
            kind,
        }
    }
}

/// Errors raised while loading a participant's source
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Source not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed source {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to parse record: {0}")]
    Parse(#[from] RecordError),

    #[error("No valid records in {} ({} rejected)", .path.display(), .rejected.len())]
    EmptyResult {
        path: PathBuf,
        rejected: Vec<RecordError>,
    },
}

/// Caller errors in the binning configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors that can occur anywhere in the processing pipeline
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Modality '{0}' has no time-series loader")]
    UnsupportedModality(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
