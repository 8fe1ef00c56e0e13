//! Scratch directories for filesystem tests

use std::fs;
use std::path::{Path, PathBuf};

/// A `tempfile` directory with helpers for laying out participant folders
pub struct TempDir {
    inner: tempfile::TempDir,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        let inner = tempfile::Builder::new()
            .prefix(&format!("streamdash_{label}_"))
            .tempdir()
            .unwrap();
        Self { inner }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Write `contents` to `relative`, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path().join(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }
}
