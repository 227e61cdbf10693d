use std::path::{Path, PathBuf};

use crate::record::FileRecord;
use crate::signals::MediaSignals;
use crate::unit_kind::UnitKind;

/// A primary video file together with the companions that follow it
/// (subtitles, per-file artwork, per-file NFO) and its extracted signals.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PrimaryFile {
    pub record: FileRecord,
    pub companions: Vec<FileRecord>,
    pub signals: MediaSignals,
}

impl PrimaryFile {
    pub fn new(record: FileRecord) -> Self {
        Self {
            record,
            companions: Vec::new(),
            signals: MediaSignals::default(),
        }
    }
}

/// A directory-scoped grouping of one movie's or show's files.
///
/// Invariants: every primary belongs to exactly one unit; every companion
/// is owned by exactly one primary or by the unit itself. Units are built
/// fresh on every grouping pass and never persisted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaUnit {
    /// Root directory identifying the unit.
    pub root: PathBuf,
    pub kind: UnitKind,
    pub primaries: Vec<PrimaryFile>,
    /// Unit-level companions: posters, fanart, `movie.nfo` / `tvshow.nfo`.
    pub companions: Vec<FileRecord>,
    /// Unit-level signals (title, year, ids) shared by every primary.
    pub signals: MediaSignals,
    /// Non-fatal problems found while grouping or identifying.
    pub warnings: Vec<String>,
}

impl MediaUnit {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            kind: UnitKind::Unknown,
            primaries: Vec::new(),
            companions: Vec::new(),
            signals: MediaSignals::default(),
            warnings: Vec::new(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.primaries
            .iter()
            .map(|p| 1 + p.companions.len())
            .sum::<usize>()
            + self.companions.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.primaries
            .iter()
            .map(|p| {
                p.record.size_bytes
                    + p.companions.iter().map(|c| c.size_bytes).sum::<u64>()
            })
            .sum::<u64>()
            + self.companions.iter().map(|c| c.size_bytes).sum::<u64>()
    }

    pub fn contains_source(&self, path: &Path) -> bool {
        self.primaries.iter().any(|p| {
            p.record.path == path || p.companions.iter().any(|c| c.path == path)
        }) || self.companions.iter().any(|c| c.path == path)
    }
}
