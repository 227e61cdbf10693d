use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// One file surfaced by the scanner, already filtered to recognized
/// extensions. The engine never re-enumerates the filesystem for grouping;
/// everything it knows about the source tree arrives as records.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_symlink: bool,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            modified: None,
            is_symlink: false,
        }
    }

    /// Filename without its extension, lossily decoded.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension without the leading dot.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}
