//! Reference filesystem scanner.
//!
//! The engine proper consumes [`FileRecord`]s from any source; this
//! walker exists for the CLI and for tests. It filters to recognized
//! extensions, honors the follow-symlinks flag, and surfaces per-path
//! errors without halting enumeration.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use shelvex_model::FileRecord;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One path that could not be scanned.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: Option<std::path::PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    pub errors: Vec<ScanError>,
}

pub struct Scanner {
    extensions: HashSet<String>,
    follow_symlinks: bool,
}

impl Scanner {
    /// `extensions` are lowercased, without the leading dot.
    pub fn new(extensions: HashSet<String>, follow_symlinks: bool) -> Self {
        Self {
            extensions,
            follow_symlinks,
        }
    }

    pub fn scan(&self, root: &Path) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    outcome.errors.push(ScanError {
                        path: err.path().map(|p| p.to_path_buf()),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let extension = entry
                .path()
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !self.extensions.contains(&extension) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    let modified = metadata
                        .modified()
                        .ok()
                        .map(DateTime::<Utc>::from);
                    outcome.records.push(FileRecord {
                        path: entry.path().to_path_buf(),
                        size_bytes: metadata.len(),
                        modified,
                        is_symlink: entry.path_is_symlink(),
                    });
                }
                Err(err) => {
                    warn!("cannot stat {}: {err}", entry.path().display());
                    outcome.errors.push(ScanError {
                        path: Some(entry.path().to_path_buf()),
                        message: err.to_string(),
                    });
                }
            }
        }

        debug!(
            "scanned {} records ({} errors) under {}",
            outcome.records.len(),
            outcome.errors.len(),
            root.display()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extensions() -> HashSet<String> {
        ["mkv", "srt", "nfo"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scans_recognized_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Movie")).unwrap();
        fs::write(dir.path().join("Movie/movie.mkv"), b"video").unwrap();
        fs::write(dir.path().join("Movie/movie.srt"), b"subs").unwrap();
        fs::write(dir.path().join("Movie/notes.txt"), b"skip me").unwrap();

        let outcome = Scanner::new(extensions(), false).scan(dir.path());
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.errors.is_empty());
        assert!(
            outcome
                .records
                .iter()
                .all(|r| r.extension() == "mkv" || r.extension() == "srt")
        );
    }

    #[test]
    fn missing_root_is_an_error_not_a_panic() {
        let outcome = Scanner::new(extensions(), false).scan(Path::new("/does/not/exist"));
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }
}
