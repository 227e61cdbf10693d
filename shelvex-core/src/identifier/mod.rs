//! Identification: enrich media units with signals and classify them.
//!
//! Signal precedence is sidecar > filename > folder. Sidecar parsing is
//! tolerant; a malformed NFO downgrades to filename-only identification
//! with a unit warning, never a failure. Classification follows the
//! ladder: episode/season/date evidence makes a Show, a lone primary is a
//! Movie, and ambiguous multi-video folders are Unknown (mixed content)
//! unless strict grouping is off and the common-prefix heuristic applies.

pub mod nfo;
pub mod patterns;
pub mod title;

use std::path::Path;
use std::sync::Arc;

use shelvex_model::{MediaUnit, ProviderCorroboration, SignalSource, UnitKind};
use tracing::debug;

use crate::grouper::GroupingRules;
use crate::providers::{MatchQuery, ProviderManager};
use title::TitleRules;

pub struct Identifier {
    title_rules: TitleRules,
    strict_grouping: bool,
    providers: Arc<ProviderManager>,
}

impl Identifier {
    pub fn new(
        title_rules: TitleRules,
        strict_grouping: bool,
        providers: Arc<ProviderManager>,
    ) -> Self {
        Self {
            title_rules,
            strict_grouping,
            providers,
        }
    }

    pub fn offline(strict_grouping: bool) -> Self {
        Self::new(
            TitleRules::default(),
            strict_grouping,
            Arc::new(ProviderManager::disabled()),
        )
    }

    /// Identify one unit in place: extract signals, classify, and (when
    /// providers are enabled) fold in the online best match.
    pub async fn identify(&self, unit: &mut MediaUnit, grouping: &GroupingRules) {
        self.parse_unit_sidecar(unit);
        self.extract_primary_signals(unit);
        self.classify(unit);
        self.resolve_titles(unit, grouping);
        self.enrich_from_provider(unit).await;
        debug!(
            "identified {} as {} ({} primaries)",
            unit.root.display(),
            unit.kind,
            unit.primaries.len()
        );
    }

    /// Parse a unit-level NFO (`movie.nfo`, `tvshow.nfo`, `show.nfo`).
    fn parse_unit_sidecar(&self, unit: &mut MediaUnit) {
        let candidate = unit.companions.iter().find(|c| {
            c.extension() == "nfo"
                && matches!(c.stem().to_lowercase().as_str(), "movie" | "tvshow" | "show")
        });
        let Some(record) = candidate else {
            return;
        };
        match nfo::parse_nfo_file(&record.path) {
            Some(data) => data.apply_to(&mut unit.signals),
            None => unit.warnings.push(format!(
                "malformed sidecar metadata: {}",
                record.path.display()
            )),
        }
    }

    /// Extract per-primary signals from filename, folders, and any
    /// stem-matched NFO companion.
    fn extract_primary_signals(&self, unit: &mut MediaUnit) {
        let mut warnings = Vec::new();

        for primary in &mut unit.primaries {
            let stem = primary.record.stem();
            let signals = &mut primary.signals;

            if let Some(episode) = patterns::extract_episode_info(&stem) {
                signals.season = Some(episode.season);
                signals.episodes = episode.episodes;
                if let Some(title) = episode.title {
                    signals.episode_title = Some(title);
                    signals.episode_title_source = Some(SignalSource::Filename);
                }
            } else if let Some(season) = season_from_folders(&primary.record.path) {
                signals.season = Some(season);
            }

            signals.date = patterns::extract_date(&stem);
            signals.part = patterns::extract_part(&stem);
            if signals.date.is_none() {
                signals.year = patterns::extract_year(&stem);
            }

            // A stem-matched NFO overrides what the filename said.
            let sidecar = primary.companions.iter().find(|c| c.extension() == "nfo");
            if let Some(record) = sidecar {
                match nfo::parse_nfo_file(&record.path) {
                    Some(data) => data.apply_to(signals),
                    None => warnings.push(format!(
                        "malformed sidecar metadata: {}",
                        record.path.display()
                    )),
                }
            }

            // Unit-level sidecar data fills whatever is still missing.
            let unit_signals = unit.signals.clone();
            primary.signals.merge_missing(&unit_signals);
        }

        unit.warnings.extend(warnings);
    }

    fn classify(&self, unit: &mut MediaUnit) {
        let has_season_folder = unit
            .primaries
            .iter()
            .any(|p| season_from_folders(&p.record.path).is_some());
        let has_episode_signal = unit.primaries.iter().any(|p| p.signals.has_episode_info())
            || unit.signals.season.is_some();

        if has_season_folder || has_episode_signal {
            unit.kind = UnitKind::Show;
            return;
        }

        match unit.primaries.len() {
            0 => unit.kind = UnitKind::Unknown,
            1 => unit.kind = UnitKind::Movie,
            _ => {
                // Multipart movie: every file carries a distinct part marker.
                let mut parts: Vec<u8> = unit
                    .primaries
                    .iter()
                    .filter_map(|p| p.signals.part)
                    .collect();
                parts.sort_unstable();
                parts.dedup();
                if parts.len() == unit.primaries.len() {
                    unit.kind = UnitKind::Movie;
                    return;
                }

                if self.strict_grouping {
                    unit.kind = UnitKind::Unknown;
                    unit.warnings.push(format!(
                        "mixed content: {} videos without clear classification",
                        unit.primaries.len()
                    ));
                } else {
                    let stems: Vec<String> =
                        unit.primaries.iter().map(|p| p.record.stem()).collect();
                    let prefix = common_prefix(&stems);
                    if prefix.trim().len() > 3 {
                        unit.kind = UnitKind::Show;
                    } else {
                        unit.kind = UnitKind::Unknown;
                        unit.warnings.push(format!(
                            "mixed content: {} videos without clear classification",
                            unit.primaries.len()
                        ));
                    }
                }
            }
        }
    }

    /// Settle the unit title and year after classification.
    fn resolve_titles(&self, unit: &mut MediaUnit, grouping: &GroupingRules) {
        self.lift_primary_sidecar(unit);
        if unit.signals.title.is_some() {
            // Sidecar title already present; just backfill the year.
            if unit.signals.year.is_none()
                && let Some(root_name) = folder_name(&unit.root)
            {
                unit.signals.year = patterns::extract_year(&root_name);
            }
            self.propagate_unit_title(unit);
            return;
        }

        let root_name = folder_name(&unit.root).unwrap_or_default();
        let root_is_usable = !root_name.is_empty()
            && !grouping.generic_roots.contains(&root_name.to_lowercase())
            && patterns::extract_season_from_folder(&root_name).is_none();

        let (title, year, source) = if root_is_usable {
            let year = patterns::extract_year(&root_name);
            (
                title::clean_title(&root_name, year, &self.title_rules),
                year,
                SignalSource::Folder,
            )
        } else {
            // Fall back to the first primary's filename.
            let stem = unit
                .primaries
                .first()
                .map(|p| p.record.stem())
                .unwrap_or_default();
            let marker_free = patterns::title_before_marker(&stem).to_string();
            let year = unit
                .primaries
                .first()
                .and_then(|p| p.signals.year)
                .or_else(|| patterns::extract_year(&stem));
            (
                title::clean_title(&marker_free, year, &self.title_rules),
                year,
                SignalSource::Filename,
            )
        };

        if !title.is_empty() {
            unit.signals.title = Some(title);
            unit.signals.title_source = Some(source);
        }
        if unit.signals.year.is_none() {
            unit.signals.year = year;
            // Movie years may come from the filename; a year inside an
            // episode filename is usually not the show's year.
            if unit.signals.year.is_none() && unit.kind == UnitKind::Movie {
                unit.signals.year = unit.primaries.iter().find_map(|p| p.signals.year);
            }
        }
        self.propagate_unit_title(unit);
    }

    /// Per-file sidecars carry work-level facts too (title, year, ids);
    /// lift them to the unit so scoring and naming see them.
    fn lift_primary_sidecar(&self, unit: &mut MediaUnit) {
        let Some(first) = unit.primaries.first() else {
            return;
        };
        let primary_signals = first.signals.clone();
        if unit.signals.title.is_none()
            && primary_signals.title_source == Some(SignalSource::Sidecar)
        {
            unit.signals.title = primary_signals.title.clone();
            unit.signals.title_source = Some(SignalSource::Sidecar);
            if unit.signals.year.is_none() {
                unit.signals.year = primary_signals.year;
            }
        }
        unit.signals.ids.merge_missing(&primary_signals.ids);
    }

    fn propagate_unit_title(&self, unit: &mut MediaUnit) {
        let unit_signals = unit.signals.clone();
        for primary in &mut unit.primaries {
            primary.signals.merge_missing(&unit_signals);
        }
    }

    async fn enrich_from_provider(&self, unit: &mut MediaUnit) {
        if !self.providers.is_enabled() || unit.kind == UnitKind::Unknown {
            return;
        }
        let query = MatchQuery {
            title: unit.signals.title.clone(),
            year: unit.signals.year,
            ids: unit.signals.ids.clone(),
            kind: unit.kind,
        };
        let Some(found) = self.providers.best_match(&query).await else {
            return;
        };

        let id_match = [
            (&unit.signals.ids.imdb, &found.ids.imdb),
            (&unit.signals.ids.tmdb, &found.ids.tmdb),
            (&unit.signals.ids.tvdb, &found.ids.tvdb),
        ]
        .iter()
        .any(|(ours, theirs)| {
            matches!((ours, theirs), (Some(a), Some(b)) if a == b)
        });
        let title_year_match = unit
            .signals
            .title
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(&found.title))
            && unit.signals.year.is_some()
            && unit.signals.year == found.year;

        if unit.signals.title.is_none() {
            unit.signals.title = Some(found.title.clone());
            unit.signals.title_source = Some(SignalSource::Provider);
        }
        if unit.signals.year.is_none() {
            unit.signals.year = found.year;
        }
        unit.signals.ids.merge_missing(&found.ids);
        unit.signals.provider = Some(ProviderCorroboration {
            id_match,
            title_year_match,
        });

        let unit_signals = unit.signals.clone();
        for primary in &mut unit.primaries {
            if primary.signals.episode_title.is_none()
                && let (Some(season), Some(episode)) =
                    (primary.signals.season, primary.signals.episodes.first().copied())
                && let Some(title) = found.episode_titles.get(&(season, episode))
            {
                primary.signals.episode_title = Some(title.clone());
                primary.signals.episode_title_source = Some(SignalSource::Provider);
            }
            primary.signals.merge_missing(&unit_signals);
            primary.signals.provider = unit_signals.provider;
        }
    }
}

/// Season hint from the file's parent or grandparent folder name.
fn season_from_folders(path: &Path) -> Option<u16> {
    let parent = path.parent()?;
    if let Some(name) = parent.file_name()
        && let Some(season) = patterns::extract_season_from_folder(&name.to_string_lossy())
    {
        return Some(season);
    }
    let grandparent = parent.parent()?;
    grandparent
        .file_name()
        .and_then(|name| patterns::extract_season_from_folder(&name.to_string_lossy()))
}

fn folder_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix = first.clone();
    for name in &names[1..] {
        let shared = prefix
            .chars()
            .zip(name.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(
            prefix
                .char_indices()
                .nth(shared)
                .map(|(i, _)| i)
                .unwrap_or(prefix.len()),
        );
        if prefix.is_empty() {
            break;
        }
    }
    prefix.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouper::{GroupingRules, build_units};
    use shelvex_model::FileRecord;

    fn rec(path: &str) -> FileRecord {
        FileRecord::new(path, 4096)
    }

    async fn identify_all(records: Vec<FileRecord>, source_root: &str, strict: bool) -> Vec<MediaUnit> {
        let grouping = GroupingRules::default();
        let mut units = build_units(&records, Path::new(source_root), &grouping);
        let identifier = Identifier::offline(strict);
        for unit in &mut units {
            identifier.identify(unit, &grouping).await;
        }
        units
    }

    #[tokio::test]
    async fn movie_with_year_in_folder() {
        let units = identify_all(
            vec![rec("/src/The Matrix (1999)/the.matrix.1999.mkv")],
            "/src",
            true,
        )
        .await;
        let unit = &units[0];
        assert_eq!(unit.kind, UnitKind::Movie);
        assert_eq!(unit.signals.title.as_deref(), Some("The Matrix"));
        assert_eq!(unit.signals.year, Some(1999));
    }

    #[tokio::test]
    async fn season_folder_makes_a_show() {
        let units = identify_all(
            vec![
                rec("/src/Breaking Bad/Season 01/Breaking.Bad.S01E01.mkv"),
                rec("/src/Breaking Bad/Season 01/Breaking.Bad.S01E02.mkv"),
            ],
            "/src",
            true,
        )
        .await;
        let unit = &units[0];
        assert_eq!(unit.kind, UnitKind::Show);
        assert_eq!(unit.signals.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(unit.primaries[0].signals.season, Some(1));
        assert_eq!(unit.primaries[0].signals.episodes, vec![1]);
        assert_eq!(unit.primaries[1].signals.episodes, vec![2]);
    }

    #[tokio::test]
    async fn date_based_release_is_a_show() {
        let units = identify_all(
            vec![rec("/src/The Daily Show/The.Daily.Show.2024.01.15.mkv")],
            "/src",
            true,
        )
        .await;
        assert_eq!(units[0].kind, UnitKind::Show);
        assert!(units[0].primaries[0].signals.date.is_some());
    }

    #[tokio::test]
    async fn mixed_folder_is_unknown_in_strict_mode() {
        let units = identify_all(
            vec![
                rec("/src/stuff/Heat.1995.mkv"),
                rec("/src/stuff/Ronin.1998.mkv"),
            ],
            "/src",
            true,
        )
        .await;
        let unit = &units[0];
        assert_eq!(unit.kind, UnitKind::Unknown);
        assert!(unit.warnings.iter().any(|w| w.contains("mixed content")));
    }

    #[tokio::test]
    async fn common_prefix_heuristic_applies_without_strict_mode() {
        let units = identify_all(
            vec![
                rec("/src/stuff/Lecture Series 01.mkv"),
                rec("/src/stuff/Lecture Series 02.mkv"),
            ],
            "/src",
            false,
        )
        .await;
        assert_eq!(units[0].kind, UnitKind::Show);
    }

    #[tokio::test]
    async fn multipart_movie_stays_a_movie() {
        let units = identify_all(
            vec![
                rec("/src/Long Epic (1968)/Long Epic Part 1.mkv"),
                rec("/src/Long Epic (1968)/Long Epic Part 2.mkv"),
            ],
            "/src",
            true,
        )
        .await;
        let unit = &units[0];
        assert_eq!(unit.kind, UnitKind::Movie);
        assert_eq!(unit.primaries[0].signals.part, Some(1));
        assert_eq!(unit.primaries[1].signals.part, Some(2));
    }

    #[tokio::test]
    async fn episode_title_survives_extraction() {
        let units = identify_all(
            vec![rec("/src/Show/Season 01/Show - S01E01 - Pilot.mkv")],
            "/src",
            true,
        )
        .await;
        let signals = &units[0].primaries[0].signals;
        assert_eq!(signals.episode_title.as_deref(), Some("Pilot"));
        assert_eq!(signals.episode_title_source, Some(SignalSource::Filename));
    }

    #[test]
    fn common_prefix_basics() {
        assert_eq!(
            common_prefix(&["Show.S01E01".into(), "Show.S01E02".into()]),
            "Show.S01E0"
        );
        assert_eq!(common_prefix(&["abc".into(), "xyz".into()]), "");
    }
}
