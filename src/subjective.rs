//! Subjective diaries
//!
//! Participants fill in diaries in the study app, which exports them as Excel
//! workbooks. Each workbook carries up to four diary sheets at fixed positions.
//! A sheet counts as filled when it has any non-empty row below its header,
//! and the first non-empty cell of its last row dates the latest entry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::normalizer::TimestampNormalizer;
use crate::types::ParticipantId;

/// Diary folder relative to the participant folder
pub const DIARY_DIR: &str = "App";
const WORKBOOK_HINT: &str = "App";
const WORKBOOK_EXTENSION: &str = ".xls";
/// Prefix of the lock files Office leaves next to open workbooks
const LOCK_FILE_PREFIX: &str = "~$";

/// Date and time embedded in free text, e.g. `2024-09-30 21:03:13.560 nachm.`
const DATETIME_IN_TEXT: &str = r"\d{4}[-/]\d{2}[-/]\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?";

/// Diary kind, by sheet position in the workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiarySection {
    SleepDiary,
    TetDiary,
    ActivityDiary,
    TetMeditation,
}

impl DiarySection {
    /// Sections in sheet order
    pub const ALL: [DiarySection; 4] = [
        DiarySection::SleepDiary,
        DiarySection::TetDiary,
        DiarySection::ActivityDiary,
        DiarySection::TetMeditation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiarySection::SleepDiary => "sleep_diary",
            DiarySection::TetDiary => "tet_diary",
            DiarySection::ActivityDiary => "activity_diary",
            DiarySection::TetMeditation => "tet_meditation",
        }
    }

    /// Zero-based sheet position
    pub fn sheet_index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DiarySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diary section of one workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub participant_id: ParticipantId,
    pub file: PathBuf,
    pub section: DiarySection,
    pub sheet_index: usize,
    /// `None` when the workbook has fewer sheets than sections
    pub sheet_name: Option<String>,
    pub has_data: bool,
    pub recording_date: Option<NaiveDateTime>,
}

/// What a single sheet holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SheetStatus {
    pub has_data: bool,
    pub recording_date: Option<NaiveDateTime>,
}

/// Whether a file name looks like an app diary export (not an Office lock file)
pub fn is_diary_workbook(name: &str) -> bool {
    !name.starts_with(LOCK_FILE_PREFIX)
        && name.contains(WORKBOOK_HINT)
        && name.contains(WORKBOOK_EXTENSION)
}

/// Inspect a sheet given as rows of cells, the first of which is the header
pub fn sheet_status<'a>(
    rows: impl IntoIterator<Item = &'a [Data]>,
    normalizer: &TimestampNormalizer,
) -> SheetStatus {
    let last_row = rows
        .into_iter()
        .skip(1)
        .filter(|row| !row.iter().all(is_blank))
        .last();

    match last_row {
        None => SheetStatus::default(),
        Some(row) => SheetStatus {
            has_data: true,
            recording_date: row
                .iter()
                .find(|cell| !is_blank(cell))
                .and_then(|cell| cell_datetime(cell, normalizer)),
        },
    }
}

/// Read the diary sections of one workbook; missing sheets give empty entries
pub fn read_diary_workbook(
    participant: &ParticipantId,
    path: &Path,
    normalizer: &TimestampNormalizer,
) -> Result<Vec<DiaryEntry>, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let sheet_names = workbook.sheet_names();

    let mut entries = Vec::with_capacity(DiarySection::ALL.len());
    for section in DiarySection::ALL {
        let sheet_name = sheet_names.get(section.sheet_index()).cloned();
        let status = match &sheet_name {
            None => {
                log::debug!("{} has no {} sheet", path.display(), section);
                SheetStatus::default()
            }
            Some(name) => match workbook.worksheet_range(name) {
                Ok(range) => sheet_status(range.rows(), normalizer),
                Err(e) => {
                    log::warn!("cannot read sheet '{}' of {}: {}", name, path.display(), e);
                    SheetStatus::default()
                }
            },
        };

        entries.push(DiaryEntry {
            participant_id: participant.clone(),
            file: path.to_path_buf(),
            section,
            sheet_index: section.sheet_index(),
            sheet_name,
            has_data: status.has_data,
            recording_date: status.recording_date,
        });
    }
    Ok(entries)
}

/// Diary entries for every readable workbook, in file order.
///
/// Workbooks that cannot be opened are skipped with a warning.
pub fn load_diaries(
    participant: &ParticipantId,
    files: &[PathBuf],
    normalizer: &TimestampNormalizer,
) -> Vec<DiaryEntry> {
    let mut entries = Vec::new();
    for path in files {
        match read_diary_workbook(participant, path, normalizer) {
            Ok(found) => entries.extend(found),
            Err(e) => log::warn!("skipping diary workbook: {}", e),
        }
    }
    entries
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_datetime(cell: &Data, normalizer: &TimestampNormalizer) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(_) => cell.as_datetime(),
        Data::String(text) | Data::DateTimeIso(text) => text_datetime(text, normalizer),
        _ => None,
    }
}

/// Embedded `YYYY-MM-DD HH:MM:SS[.fff]` first, else the whole text as a timestamp
fn text_datetime(text: &str, normalizer: &TimestampNormalizer) -> Option<NaiveDateTime> {
    if let Some(found) = datetime_pattern().and_then(|re| re.find(text)) {
        let canonical = found
            .as_str()
            .replace(',', ".")
            .replace('/', "-")
            .replace('T', " ");
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&canonical, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(parsed);
        }
    }
    normalizer.normalize(text.trim())
}

fn datetime_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DATETIME_IN_TEXT).ok()).as_ref()
}
