//! EEG session reports
//!
//! Sleep and meditation modalities are not sample streams: each session leaves
//! a Dreem report file listing `key,value` rows, of which the record start and
//! stop times are used to place the session on the participant's timeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::normalizer::TimestampNormalizer;
use crate::types::Modality;

const REPORT_FILE_HINT: &str = "report";
const DREEM_HINT: &str = "dreem";
const START_KEY: &str = "record_start_iso";
const STOP_KEY: &str = "record_stop_iso";

/// Separators tried, in order, when reading key/value reports
const KV_SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Kind of EEG session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingKind {
    Sleep,
    Meditation,
}

impl RecordingKind {
    /// Report directory relative to the participant folder
    pub fn relative_dir(&self) -> PathBuf {
        match self {
            RecordingKind::Sleep => Path::new("EEG").join("Night"),
            RecordingKind::Meditation => Path::new("EEG").join("Meditation"),
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            RecordingKind::Sleep => Modality::Sleep,
            RecordingKind::Meditation => Modality::Meditation,
        }
    }

    pub fn from_modality(modality: Modality) -> Option<Self> {
        match modality {
            Modality::Sleep => Some(RecordingKind::Sleep),
            Modality::Meditation => Some(RecordingKind::Meditation),
            Modality::Wristband => None,
        }
    }
}

/// One EEG session placed in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub kind: RecordingKind,
    /// Night or session folder the report was found under
    pub session: String,
    pub file: String,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    /// Zero when stop is not after start
    pub duration_hours: f64,
}

/// Totals across a participant's sessions of one kind
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub sessions: usize,
    pub total_hours: f64,
}

/// Whether a file name looks like a Dreem session report
pub fn is_report_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".csv") && lower.contains(REPORT_FILE_HINT) && lower.contains(DREEM_HINT)
}

/// Read `key<sep>value` rows into a map with lowercased keys.
///
/// The separator is the first of `,` `;` tab that appears in the text; rows
/// without it fall back to whitespace splitting. `#` lines are comments.
pub fn read_key_value_report(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();

    let content_lines = || {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
    };
    let separator = KV_SEPARATORS
        .iter()
        .copied()
        .find(|&sep| content_lines().any(|l| l.as_bytes().contains(&sep)));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator.unwrap_or(b','))
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                log::warn!("skipping unreadable report row: {}", e);
                continue;
            }
        };
        let (key, value) = if row.len() >= 2 {
            let sep = separator.map(char::from).unwrap_or(',').to_string();
            let rest: Vec<&str> = row.iter().skip(1).collect();
            (row[0].to_string(), rest.join(&sep))
        } else {
            let line = row.get(0).unwrap_or("");
            match line.split_once(char::is_whitespace) {
                Some((k, v)) => (k.to_string(), v.trim().to_string()),
                None => continue,
            }
        };
        let key = key.trim().to_lowercase();
        if !key.is_empty() {
            map.insert(key, value.trim().to_string());
        }
    }

    map
}

/// Load session reports found under a participant folder.
///
/// Reports missing a parseable start or stop time are skipped. Sessions are
/// returned in start order.
pub fn load_recordings(
    kind: RecordingKind,
    participant_dir: &Path,
    files: &[PathBuf],
    normalizer: &TimestampNormalizer,
) -> Vec<Recording> {
    let base = participant_dir.join(kind.relative_dir());
    let mut recordings = Vec::new();

    for path in files {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match read_report_text(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("cannot read report {}: {}", path.display(), e);
                continue;
            }
        };

        let kv = read_key_value_report(&text);
        let start = kv.get(START_KEY).and_then(|s| normalizer.normalize(s));
        let stop = kv.get(STOP_KEY).and_then(|s| normalizer.normalize(s));
        let (start, stop) = match (start, stop) {
            (Some(start), Some(stop)) => (start, stop),
            _ => {
                log::debug!("missing start/stop in {}, skipping", path.display());
                continue;
            }
        };

        let duration_hours = if stop > start {
            (stop - start).num_milliseconds() as f64 / 3_600_000.0
        } else {
            0.0
        };

        recordings.push(Recording {
            kind,
            session: session_name(&base, path),
            file,
            start,
            stop,
            duration_hours,
        });
    }

    recordings.sort_by_key(|r| r.start);
    recordings
}

/// Count sessions and sum their durations
pub fn summarize_recordings(recordings: &[Recording]) -> RecordingSummary {
    let sessions: BTreeSet<&str> = recordings.iter().map(|r| r.session.as_str()).collect();
    RecordingSummary {
        sessions: sessions.len(),
        total_hours: recordings.iter().map(|r| r.duration_hours).sum(),
    }
}

/// First folder below the kind's base directory, else the report's parent folder
fn session_name(base: &Path, path: &Path) -> String {
    let from_base = path.strip_prefix(base).ok().and_then(|rel| {
        let mut components = rel.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(first)), Some(_)) => Some(first.to_string_lossy().into_owned()),
            _ => None,
        }
    });
    from_base
        .or_else(|| {
            path.parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

/// Reports are UTF-8, but some exports are Latin-1
fn read_report_text(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    })
}
