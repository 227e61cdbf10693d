//! Grouping: partition scanned file records into media units.
//!
//! A unit is identified by its root directory: the nearest ancestor of a
//! primary video that is not a generic organizational folder. Season-like
//! folders (`Season 01`, `Specials`) and permitted companion folders
//! (`Subs`, `Extras`) climb one level further so episodes land under the
//! show root. Grouping is a pure function of the scanned records plus the
//! injected rules; it never touches the filesystem.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use shelvex_model::{FileRecord, MediaUnit, PrimaryFile};
use tracing::debug;

use crate::identifier::patterns::extract_season_from_folder;

/// Injected grouping configuration.
#[derive(Debug, Clone)]
pub struct GroupingRules {
    /// Lowercased folder names that never qualify as a unit root.
    pub generic_roots: HashSet<String>,
    /// Lowercased nested folders whose files are companions of the unit.
    pub nested_companion_dirs: HashSet<String>,
    /// Lowercased extensions (without dot) treated as primary videos.
    pub video_extensions: HashSet<String>,
    /// Lowercased extensions treated as companions (subtitles, artwork,
    /// sidecar metadata).
    pub companion_extensions: HashSet<String>,
    /// Lowercased stems that attach to the unit itself when no primary
    /// matches (`movie.nfo`, `poster.jpg`, ...).
    pub unit_companion_stems: HashSet<String>,
}

const DEFAULT_GENERIC_ROOTS: &[&str] = &[
    "source", "sources", "tv", "movies", "movie", "video", "videos", "media",
    "downloads", "download", "incoming", "complete",
];

const DEFAULT_NESTED_COMPANION_DIRS: &[&str] = &["subs", "subtitles", "extras"];

const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "m4v", "mpg", "mpeg", "webm", "ts",
];

const DEFAULT_COMPANION_EXTENSIONS: &[&str] = &[
    // Subtitles
    "srt", "ssa", "ass", "vtt", "sub", "idx", "sbv", "lrc", "smi", "stl",
    // Metadata and artwork
    "nfo", "jpg", "jpeg", "png",
];

const DEFAULT_UNIT_COMPANION_STEMS: &[&str] = &[
    "movie", "tvshow", "show", "poster", "fanart", "banner", "landscape", "clearlogo",
];

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GroupingRules {
    fn default() -> Self {
        Self {
            generic_roots: to_set(DEFAULT_GENERIC_ROOTS),
            nested_companion_dirs: to_set(DEFAULT_NESTED_COMPANION_DIRS),
            video_extensions: to_set(DEFAULT_VIDEO_EXTENSIONS),
            companion_extensions: to_set(DEFAULT_COMPANION_EXTENSIONS),
            unit_companion_stems: to_set(DEFAULT_UNIT_COMPANION_STEMS),
        }
    }
}

impl GroupingRules {
    pub fn is_video(&self, record: &FileRecord) -> bool {
        self.video_extensions.contains(&record.extension())
    }

    pub fn is_companion_ext(&self, record: &FileRecord) -> bool {
        self.companion_extensions.contains(&record.extension())
    }

    fn is_generic(&self, folder_name: &str) -> bool {
        self.generic_roots.contains(&folder_name.to_lowercase())
    }

    /// Season folders and permitted companion folders live inside a unit,
    /// so the unit root is one level further up.
    fn climbs_to_parent(&self, folder_name: &str) -> bool {
        extract_season_from_folder(folder_name).is_some()
            || self
                .nested_companion_dirs
                .contains(&folder_name.to_lowercase())
    }
}

/// Resolve the unit root for a file: the nearest ancestor directory under
/// `source_root` that is neither generic nor season-like.
pub fn unit_root_for(path: &Path, source_root: &Path, rules: &GroupingRules) -> PathBuf {
    let fallback = path.parent().unwrap_or(source_root).to_path_buf();
    let mut current = path.parent();

    while let Some(dir) = current {
        if dir == source_root || dir.parent().is_none() {
            break;
        }
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            break;
        };
        if rules.climbs_to_parent(&name) {
            let parent = dir.parent().unwrap_or(dir);
            // Subs nested inside a season folder climbs twice, so the
            // subtitle lands in the same unit as its episodes.
            let parent_climbs = parent != source_root
                && parent
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .is_some_and(|n| rules.climbs_to_parent(&n));
            if parent_climbs {
                return parent.parent().unwrap_or(parent).to_path_buf();
            }
            return parent.to_path_buf();
        }
        if !rules.is_generic(&name) {
            return dir.to_path_buf();
        }
        current = dir.parent();
    }

    fallback
}

/// Partition the scanned records into media units.
///
/// Every primary video belongs to exactly one unit; every companion
/// record is attached to exactly one primary (stem match) or to the unit
/// itself. Companions with no owning unit are dropped with a debug line.
pub fn build_units(
    records: &[FileRecord],
    source_root: &Path,
    rules: &GroupingRules,
) -> Vec<MediaUnit> {
    let mut units: BTreeMap<PathBuf, MediaUnit> = BTreeMap::new();
    let mut companions: Vec<&FileRecord> = Vec::new();

    for record in records {
        if rules.is_video(record) {
            let root = unit_root_for(&record.path, source_root, rules);
            let unit = units
                .entry(root.clone())
                .or_insert_with(|| MediaUnit::new(root));
            unit.primaries.push(PrimaryFile::new(record.clone()));
        } else if rules.is_companion_ext(record) {
            companions.push(record);
        } else {
            debug!("ignoring unrecognized record {}", record.path.display());
        }
    }

    for unit in units.values_mut() {
        unit.primaries
            .sort_by(|a, b| a.record.path.cmp(&b.record.path));
    }

    for record in companions {
        let root = unit_root_for(&record.path, source_root, rules);
        let Some(unit) = units.get_mut(&root) else {
            debug!("companion without a unit: {}", record.path.display());
            continue;
        };
        attach_companion(unit, record, rules);
    }

    for unit in units.values_mut() {
        for primary in &mut unit.primaries {
            primary.companions.sort_by(|a, b| a.path.cmp(&b.path));
        }
        unit.companions.sort_by(|a, b| a.path.cmp(&b.path));
    }

    units.into_values().collect()
}

/// Attach one companion record to its owner inside the unit.
fn attach_companion(unit: &mut MediaUnit, record: &FileRecord, rules: &GroupingRules) {
    let stem = record.stem();

    // Stem match: exact, or primary stem plus a tag suffix such as
    // `Movie.en.srt` against `Movie.mkv`.
    if let Some(primary) = unit.primaries.iter_mut().find(|p| {
        let primary_stem = p.record.stem();
        stem == primary_stem || stem.starts_with(&format!("{primary_stem}."))
    }) {
        primary.companions.push(record.clone());
        return;
    }

    let lowered = stem.to_lowercase();
    if rules.unit_companion_stems.contains(&lowered) {
        unit.companions.push(record.clone());
        return;
    }

    // Files from permitted nested folders with no stem match still belong
    // to the unit (e.g. loose subtitles under Subs/).
    let in_nested_dir = record
        .path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|name| {
            rules.nested_companion_dirs.contains(&name)
                || extract_season_from_folder(&name).is_some()
        });
    if in_nested_dir {
        unit.companions.push(record.clone());
        return;
    }

    debug!("unmatched companion {} in {}", record.path.display(), unit.root.display());
    unit.companions.push(record.clone());
}
