//! Participant discovery
//!
//! The study data lives in one folder per participant below a base directory.
//! `ParticipantDirectory` lists participants and resolves which files hold a
//! given modality, following the device export layout:
//!
//! ```text
//! <base>/<participant>/EmbracePlus/<day>/<sub>/digital_biomarkers/aggregated_per_minute/*wearing-detection*.csv
//! <base>/<participant>/EEG/Night/**/<*dreem*report*>.csv
//! <base>/<participant>/EEG/Meditation/**/<*dreem*report*>.csv
//! <base>/<participant>/App/**/<*App*.xls*>
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::recordings::{is_report_file, RecordingKind};
use crate::subjective::{is_diary_workbook, DIARY_DIR};
use crate::types::{Modality, ParticipantId};

const EMBRACEPLUS_DIR: &str = "EmbracePlus";
const BIOMARKERS_DIR: &str = "digital_biomarkers";
const PER_MINUTE_DIR: &str = "aggregated_per_minute";
const WEARING_FILE_HINT: &str = "wearing-detection";

/// Filesystem-backed participant source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDirectory {
    base: PathBuf,
}

impl ParticipantDirectory {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Participant folder names; empty when the base directory does not exist
    pub fn list_participants(&self) -> Result<BTreeSet<ParticipantId>, LoadError> {
        if !self.base.is_dir() {
            return Ok(BTreeSet::new());
        }
        Ok(subdirectories(&self.base)?
            .iter()
            .filter_map(|p| p.file_name())
            .map(|name| ParticipantId::new(name.to_string_lossy()))
            .collect())
    }

    pub fn participant_dir(&self, participant: &ParticipantId) -> PathBuf {
        self.base.join(participant.as_str())
    }

    /// All source files for a participant's modality, sorted by path.
    ///
    /// Fails with `FileNotFound` naming the expected directory when nothing matches.
    pub fn resolve_sources(
        &self,
        participant: &ParticipantId,
        modality: Modality,
    ) -> Result<Vec<PathBuf>, LoadError> {
        let participant_dir = self.participant_dir(participant);
        let (expected, mut files) = match RecordingKind::from_modality(modality) {
            None => {
                let root = participant_dir.join(EMBRACEPLUS_DIR);
                let files = wearing_files(&root)?;
                (root, files)
            }
            Some(kind) => {
                let root = participant_dir.join(kind.relative_dir());
                let mut files = Vec::new();
                if root.is_dir() {
                    collect_files(&root, &mut files)?;
                }
                files.retain(|p| {
                    p.file_name()
                        .map(|n| is_report_file(&n.to_string_lossy()))
                        .unwrap_or(false)
                });
                (root, files)
            }
        };

        if files.is_empty() {
            return Err(LoadError::FileNotFound(expected));
        }

        files.sort();
        log::debug!(
            "resolved {} {} source(s) for {}",
            files.len(),
            modality,
            participant
        );
        Ok(files)
    }

    /// Diary workbooks below the participant's app folder, sorted by path.
    ///
    /// A participant without an app folder simply has no diaries.
    pub fn diary_workbooks(&self, participant: &ParticipantId) -> Result<Vec<PathBuf>, LoadError> {
        let root = self.participant_dir(participant).join(DIARY_DIR);
        let mut files = Vec::new();
        if root.is_dir() {
            collect_files(&root, &mut files)?;
        }
        files.retain(|p| {
            p.file_name()
                .map(|n| is_diary_workbook(&n.to_string_lossy()))
                .unwrap_or(false)
        });
        files.sort();
        Ok(files)
    }
}

/// Day folder an EmbracePlus export was filed under
pub fn export_day(path: &Path) -> Option<String> {
    let mut components = path.components().map(|c| c.as_os_str());
    components.by_ref().find(|c| *c == EMBRACEPLUS_DIR)?;
    components.next().map(|day| day.to_string_lossy().into_owned())
}

fn wearing_files(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    for day_dir in subdirectories(root)? {
        for sub_dir in subdirectories(&day_dir)? {
            let per_minute = sub_dir.join(BIOMARKERS_DIR).join(PER_MINUTE_DIR);
            if !per_minute.is_dir() {
                continue;
            }
            for entry in read_dir(&per_minute)? {
                let name = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                if entry.is_file() && name.ends_with(".csv") && name.contains(WEARING_FILE_HINT) {
                    files.push(entry);
                }
            }
        }
    }
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    for entry in read_dir(dir)? {
        if entry.is_dir() {
            collect_files(&entry, out)?;
        } else if entry.is_file() {
            out.push(entry);
        }
    }
    Ok(())
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    Ok(read_dir(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let to_error = |source: io::Error| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(to_error)? {
        paths.push(entry.map_err(to_error)?.path());
    }
    paths.sort();
    Ok(paths)
}
