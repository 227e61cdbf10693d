//! Destination planning.
//!
//! Turns an identified unit into one sanitized [`DestinationPlan`] per
//! source file. The grammar:
//!
//! - Movie: `{MoviesRoot}/{Title} ({Year})[ {IdTag}]/{Title} ({Year})[ {IdTag}][ Part {N}].{ext}`
//! - Episode: `{ShowsRoot}/{Show}[ ({Year})][ {IdTag}]/Season {SS}/{Show} - S{SS}E{EE}[-E{LL}][ Part {N}][ - {EpisodeTitle}].{ext}`
//! - Date episode: `{Show} - {YYYY-MM-DD}.{ext}`
//! - Specials land in `Season 00`; companions inherit the primary's base
//!   name with their own extension (language-tag middles preserved).
//!
//! Planning is deterministic and touches no filesystem state; two plans
//! resolving to the same destination are a collision error, surfaced
//! before execution ever starts.

pub mod sanitize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shelvex_model::{
    ConflictPolicy, DestinationPlan, FileRecord, MediaUnit, NamingMeta, PrimaryFile, UnitKind,
};
use tracing::debug;

use crate::error::{EngineError, Result};
use sanitize::{NamingRules, sanitize_segment};

pub struct Planner {
    movies_root: PathBuf,
    shows_root: PathBuf,
    rules: NamingRules,
}

impl Planner {
    pub fn new(
        movies_root: impl Into<PathBuf>,
        shows_root: impl Into<PathBuf>,
        rules: NamingRules,
    ) -> Self {
        Self {
            movies_root: movies_root.into(),
            shows_root: shows_root.into(),
            rules,
        }
    }

    /// Plan every file of a unit. Unknown units yield no plans.
    pub fn plan_unit(
        &self,
        unit: &MediaUnit,
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> Result<Vec<DestinationPlan>> {
        let mut plans = match unit.kind {
            UnitKind::Movie => self.plan_movie(unit),
            UnitKind::Show => self.plan_show(unit),
            UnitKind::Unknown => Vec::new(),
        };

        for plan in &mut plans {
            plan.policy = policy;
            plan.dry_run = dry_run;
        }

        detect_collisions(&plans)?;
        debug!("planned {} files for {}", plans.len(), unit.root.display());
        Ok(plans)
    }

    fn plan_movie(&self, unit: &MediaUnit) -> Vec<DestinationPlan> {
        let signals = &unit.signals;
        let title = signals.title.as_deref().unwrap_or("Unknown");

        let mut folder = match signals.year {
            Some(year) => format!("{title} ({year})"),
            None => title.to_string(),
        };
        if let Some(tmdb) = &signals.ids.tmdb {
            folder.push_str(&format!(" [tmdbid-{tmdb}]"));
        }
        let folder = sanitize_segment(&folder, &self.rules);
        let dir = self.movies_root.join(&folder);

        let mut plans = Vec::new();
        for primary in &unit.primaries {
            let part = primary.signals.part.or(signals.part);
            let base = match part {
                Some(part) => format!("{folder} Part {part}"),
                None => folder.clone(),
            };
            let base = sanitize_segment(&base, &self.rules);
            let naming = NamingMeta {
                part,
                ..NamingMeta::default()
            };
            self.push_primary_plans(&mut plans, primary, &dir, &base, naming);
        }

        // Unit-level companions keep their own names inside the movie folder.
        for companion in &unit.companions {
            plans.push(self.unit_companion_plan(companion, &dir));
        }
        plans
    }

    fn plan_show(&self, unit: &MediaUnit) -> Vec<DestinationPlan> {
        let signals = &unit.signals;
        let show_title = sanitize_segment(
            signals.title.as_deref().unwrap_or("Unknown Show"),
            &self.rules,
        );

        let mut show_folder = match signals.year {
            Some(year) => format!("{show_title} ({year})"),
            None => show_title.clone(),
        };
        if let Some(tmdb) = &signals.ids.tmdb {
            show_folder.push_str(&format!(" [tmdbid-{tmdb}]"));
        }
        let show_folder = sanitize_segment(&show_folder, &self.rules);
        let show_dir = self.shows_root.join(&show_folder);

        let mut plans = Vec::new();
        for primary in &unit.primaries {
            let file_signals = &primary.signals;
            let season = file_signals.season.unwrap_or(0);
            let season_dir = show_dir.join(format!("Season {season:02}"));

            let mut base;
            let naming;
            if let Some(date) = file_signals.date {
                base = format!("{show_title} - {date}");
                naming = NamingMeta {
                    date: Some(date),
                    ..NamingMeta::default()
                };
            } else if !file_signals.episodes.is_empty() {
                let first = file_signals.episodes[0];
                let last = *file_signals.episodes.last().unwrap_or(&first);
                let episode_token = if file_signals.episodes.len() > 1 {
                    format!("S{season:02}E{first:02}-E{last:02}")
                } else {
                    format!("S{season:02}E{first:02}")
                };
                base = format!("{show_title} - {episode_token}");
                if let Some(part) = file_signals.part {
                    base.push_str(&format!(" Part {part}"));
                } else if let Some(episode_title) = &file_signals.episode_title {
                    base.push_str(&format!(" - {episode_title}"));
                }
                naming = NamingMeta {
                    season: Some(season),
                    episodes: file_signals.episodes.clone(),
                    part: file_signals.part,
                    date: None,
                };
            } else {
                base = show_title.clone();
                naming = NamingMeta::default();
            }

            base = sanitize_segment(&base, &self.rules);
            self.push_primary_plans(&mut plans, primary, &season_dir, &base, naming);
        }

        for companion in &unit.companions {
            plans.push(self.unit_companion_plan(companion, &show_dir));
        }
        plans
    }

    /// Plan a primary and its companions under `dir` with base name `base`.
    fn push_primary_plans(
        &self,
        plans: &mut Vec<DestinationPlan>,
        primary: &PrimaryFile,
        dir: &Path,
        base: &str,
        naming: NamingMeta,
    ) {
        let ext = raw_extension(&primary.record.path);
        let filename = if ext.is_empty() {
            base.to_string()
        } else {
            format!("{base}.{ext}")
        };
        plans.push(DestinationPlan {
            source: primary.record.path.clone(),
            destination: dir.join(filename),
            naming: naming.clone(),
            policy: ConflictPolicy::default(),
            dry_run: true,
            owner: None,
        });

        let primary_stem = primary.record.stem();
        for companion in &primary.companions {
            // `Movie.en.srt` against `Movie.mkv` keeps the `.en` middle.
            let companion_stem = companion.stem();
            let middle = companion_stem
                .strip_prefix(&primary_stem)
                .unwrap_or_default();
            let ext = raw_extension(&companion.path);
            let filename = if ext.is_empty() {
                format!("{base}{middle}")
            } else {
                format!("{base}{middle}.{ext}")
            };
            let filename = sanitize_segment(&filename, &self.rules);
            plans.push(DestinationPlan {
                source: companion.path.clone(),
                destination: dir.join(filename),
                naming: naming.clone(),
                policy: ConflictPolicy::default(),
                dry_run: true,
                owner: Some(primary.record.path.clone()),
            });
        }
    }

    fn unit_companion_plan(&self, companion: &FileRecord, dir: &Path) -> DestinationPlan {
        let filename = companion
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        DestinationPlan {
            source: companion.path.clone(),
            destination: dir.join(sanitize_segment(&filename, &self.rules)),
            naming: NamingMeta::default(),
            policy: ConflictPolicy::default(),
            dry_run: true,
            owner: None,
        }
    }
}

/// Extension exactly as it appears on disk; naming never case-folds it.
fn raw_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Two sources sanitizing to the same destination is an invariant
/// violation; the affected unit is skipped rather than risking loss.
fn detect_collisions(plans: &[DestinationPlan]) -> Result<()> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for plan in plans {
        if let Some(first) = seen.insert(plan.destination.as_path(), plan.source.as_path()) {
            return Err(EngineError::PlanCollision {
                destination: plan.destination.clone(),
                first: first.to_path_buf(),
                second: plan.source.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelvex_model::{MediaSignals, SignalSource};

    fn planner() -> Planner {
        Planner::new("/library/Movies", "/library/Shows", NamingRules::default())
    }

    fn movie_unit() -> MediaUnit {
        let mut unit = MediaUnit::new("/src/The Matrix (1999)");
        unit.kind = UnitKind::Movie;
        unit.signals = MediaSignals {
            title: Some("The Matrix".into()),
            title_source: Some(SignalSource::Folder),
            year: Some(1999),
            ..MediaSignals::default()
        };
        let mut primary = PrimaryFile::new(FileRecord::new(
            "/src/The Matrix (1999)/the.matrix.1999.mkv",
            1024,
        ));
        primary
            .companions
            .push(FileRecord::new("/src/The Matrix (1999)/the.matrix.1999.srt", 64));
        unit.primaries.push(primary);
        unit
    }

    #[test]
    fn movie_grammar() {
        let plans = planner()
            .plan_unit(&movie_unit(), ConflictPolicy::Skip, true)
            .unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Movies/The Matrix (1999)/The Matrix (1999).mkv")
        );
        assert_eq!(
            plans[1].destination,
            Path::new("/library/Movies/The Matrix (1999)/The Matrix (1999).srt")
        );
        assert_eq!(plans[1].owner.as_deref(), Some(Path::new("/src/The Matrix (1999)/the.matrix.1999.mkv")));
    }

    #[test]
    fn movie_with_id_tag() {
        let mut unit = movie_unit();
        unit.signals.ids.tmdb = Some("603".into());
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new(
                "/library/Movies/The Matrix (1999) [tmdbid-603]/The Matrix (1999) [tmdbid-603].mkv"
            )
        );
    }

    #[test]
    fn language_tagged_subtitles_keep_their_tag() {
        let mut unit = movie_unit();
        unit.primaries[0].companions[0] =
            FileRecord::new("/src/The Matrix (1999)/the.matrix.1999.en.srt", 64);
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[1].destination,
            Path::new("/library/Movies/The Matrix (1999)/The Matrix (1999).en.srt")
        );
    }

    fn show_unit() -> MediaUnit {
        let mut unit = MediaUnit::new("/src/Show");
        unit.kind = UnitKind::Show;
        unit.signals = MediaSignals {
            title: Some("Show".into()),
            title_source: Some(SignalSource::Folder),
            ..MediaSignals::default()
        };
        let mut e1 = PrimaryFile::new(FileRecord::new("/src/Show/Season 01/Show.S01E01.mkv", 1024));
        e1.signals.season = Some(1);
        e1.signals.episodes = vec![1];
        let mut e2 = PrimaryFile::new(FileRecord::new("/src/Show/Season 01/Show.S01E02.mkv", 1024));
        e2.signals.season = Some(1);
        e2.signals.episodes = vec![2];
        unit.primaries.push(e1);
        unit.primaries.push(e2);
        unit
    }

    #[test]
    fn episode_grammar() {
        let plans = planner().plan_unit(&show_unit(), ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E01.mkv")
        );
        assert_eq!(
            plans[1].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E02.mkv")
        );
    }

    #[test]
    fn multi_episode_token() {
        let mut unit = show_unit();
        unit.primaries.truncate(1);
        unit.primaries[0].signals.episodes = vec![1, 2];
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E01-E02.mkv")
        );
    }

    #[test]
    fn specials_use_season_zero() {
        let mut unit = show_unit();
        unit.primaries.truncate(1);
        unit.primaries[0].signals.season = Some(0);
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 00/Show - S00E01.mkv")
        );
    }

    #[test]
    fn multipart_episode_reuses_the_episode() {
        let mut unit = show_unit();
        unit.primaries[0].signals.part = Some(1);
        unit.primaries[1].signals.episodes = vec![1];
        unit.primaries[1].signals.part = Some(2);
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E01 Part 1.mkv")
        );
        assert_eq!(
            plans[1].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E01 Part 2.mkv")
        );
    }

    #[test]
    fn episode_title_is_appended() {
        let mut unit = show_unit();
        unit.primaries.truncate(1);
        unit.primaries[0].signals.episode_title = Some("Pilot".into());
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 01/Show - S01E01 - Pilot.mkv")
        );
    }

    #[test]
    fn date_episode_grammar() {
        let mut unit = show_unit();
        unit.primaries.truncate(1);
        let signals = &mut unit.primaries[0].signals;
        signals.episodes.clear();
        signals.season = Some(1);
        signals.date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15);
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Shows/Show/Season 01/Show - 2024-01-15.mkv")
        );
    }

    #[test]
    fn invalid_title_characters_are_sanitized() {
        let mut unit = movie_unit();
        unit.signals.title = Some("Mission: Impossible".into());
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Movies/Mission Impossible (1999)/Mission Impossible (1999).mkv")
        );
    }

    #[test]
    fn unknown_units_produce_no_plans() {
        let mut unit = movie_unit();
        unit.kind = UnitKind::Unknown;
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn colliding_plans_are_an_error() {
        let mut unit = show_unit();
        // Same episode on both files with no distinguishing part.
        unit.primaries[1].signals.episodes = vec![1];
        let err = planner()
            .plan_unit(&unit, ConflictPolicy::Skip, true)
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanCollision { .. }));
    }

    #[test]
    fn extensions_are_preserved_verbatim() {
        let mut unit = movie_unit();
        unit.primaries[0].record = FileRecord::new("/src/The Matrix (1999)/the.matrix.MKV", 1024);
        unit.primaries[0].companions.clear();
        let plans = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(
            plans[0].destination,
            Path::new("/library/Movies/The Matrix (1999)/The Matrix (1999).MKV")
        );
    }

    #[test]
    fn planning_is_deterministic() {
        let unit = show_unit();
        let once = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        let twice = planner().plan_unit(&unit, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn generated_names_reparse_to_the_same_episode() {
        use crate::identifier::patterns::extract_episode_info;

        let plans = planner().plan_unit(&show_unit(), ConflictPolicy::Skip, true).unwrap();
        for (plan, expected_ep) in plans.iter().zip([1u16, 2]) {
            let stem = plan
                .destination
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let parsed = extract_episode_info(&stem).unwrap();
            assert_eq!(parsed.season, 1);
            assert_eq!(parsed.episodes, vec![expected_ep]);
        }
    }
}
