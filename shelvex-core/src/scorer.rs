//! Confidence scoring.
//!
//! A deterministic, additive point model over a unit's signals. Each
//! independent corroborating signal adds (or removes) a fixed weight and
//! records a reason, and the total clamps to `[0, 100]`. No filesystem or
//! provider access happens here; two calls with identical signals always
//! return identical results.

use shelvex_model::{MediaUnit, ScoreReason, ScoreResult, UnitKind};

const W_IMDB_ID: i16 = 50;
const W_TMDB_ID: i16 = 45;
const W_TVDB_ID: i16 = 40;
const W_TITLE_SIDECAR: i16 = 20;
const W_TITLE_FILENAME: i16 = 10;
const W_NO_TITLE: i16 = -20;
const W_MOVIE_YEAR: i16 = 15;
const W_MOVIE_NO_YEAR: i16 = -10;
const W_EPISODE_IDS: i16 = 20;
const W_DATE_EPISODE: i16 = 15;
const W_NO_EPISODE_IDS: i16 = -15;
const W_EPISODE_TITLE: i16 = 10;
const W_PART: i16 = 5;
const W_PROVIDER_ID_MATCH: i16 = 15;
const W_PROVIDER_TITLE_YEAR: i16 = 10;
const W_PER_WARNING: i16 = -5;

/// Score one identified unit.
pub fn score_unit(unit: &MediaUnit) -> ScoreResult {
    if unit.kind == UnitKind::Unknown {
        return ScoreResult {
            confidence: 0,
            reasons: vec![ScoreReason::new("unknown media type", 0)],
        };
    }

    let mut total: i16 = 0;
    let mut reasons: Vec<ScoreReason> = Vec::new();
    let mut add = |reason: String, weight: i16| {
        total += weight;
        reasons.push(ScoreReason { reason, weight });
    };

    let signals = &unit.signals;

    // Sidecar ids, strongest first; only the best one counts.
    if signals.ids.imdb.is_some() {
        add("IMDB id from sidecar".into(), W_IMDB_ID);
    } else if signals.ids.tmdb.is_some() {
        add("TMDB id from sidecar".into(), W_TMDB_ID);
    } else if signals.ids.tvdb.is_some() {
        add("TVDB id from sidecar".into(), W_TVDB_ID);
    }

    match (&signals.title, signals.title_source) {
        (Some(_), Some(shelvex_model::SignalSource::Sidecar)) => {
            add("title from sidecar".into(), W_TITLE_SIDECAR);
        }
        (Some(_), _) => add("title from filename".into(), W_TITLE_FILENAME),
        (None, _) => add("no title identified".into(), W_NO_TITLE),
    }

    match unit.kind {
        UnitKind::Movie => {
            if let Some(year) = signals.year {
                add(format!("year identified: {year}"), W_MOVIE_YEAR);
            } else {
                add("no year found".into(), W_MOVIE_NO_YEAR);
            }
        }
        UnitKind::Show => {
            let episode_like = unit
                .primaries
                .iter()
                .find(|p| p.signals.season.is_some() && !p.signals.episodes.is_empty());
            if let Some(primary) = episode_like {
                let signals = &primary.signals;
                let season = signals.season.unwrap_or_default();
                let episode = signals.episodes.first().copied().unwrap_or_default();
                add(
                    format!("season/episode identified: S{season:02}E{episode:02}"),
                    W_EPISODE_IDS,
                );
            } else if let Some(primary) =
                unit.primaries.iter().find(|p| p.signals.date.is_some())
            {
                let date = primary.signals.date.unwrap_or_default();
                add(format!("date episode identified: {date}"), W_DATE_EPISODE);
            } else {
                add("no season/episode information".into(), W_NO_EPISODE_IDS);
            }

            if unit
                .primaries
                .iter()
                .any(|p| p.signals.episode_title.is_some())
            {
                add("episode title identified".into(), W_EPISODE_TITLE);
            }
        }
        UnitKind::Unknown => unreachable!("handled above"),
    }

    if let Some(part) = signals.part.or_else(|| {
        unit.primaries.iter().find_map(|p| p.signals.part)
    }) {
        add(format!("part {part} identified"), W_PART);
    }

    if let Some(provider) = signals.provider {
        if provider.id_match {
            add("provider confirmed external id".into(), W_PROVIDER_ID_MATCH);
        }
        if provider.title_year_match {
            add("provider matched title and year".into(), W_PROVIDER_TITLE_YEAR);
        }
    }

    if !unit.warnings.is_empty() {
        add(
            format!("{} warning(s) during identification", unit.warnings.len()),
            W_PER_WARNING * unit.warnings.len() as i16,
        );
    }

    ScoreResult {
        confidence: total.clamp(0, 100) as u8,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelvex_model::{
        ExternalIds, FileRecord, MediaSignals, PrimaryFile, ProviderCorroboration, SignalSource,
    };

    fn movie_unit() -> MediaUnit {
        let mut unit = MediaUnit::new("/src/The Matrix (1999)");
        unit.kind = UnitKind::Movie;
        unit.primaries.push(PrimaryFile::new(FileRecord::new(
            "/src/The Matrix (1999)/the.matrix.mkv",
            1024,
        )));
        unit.signals = MediaSignals {
            title: Some("The Matrix".into()),
            title_source: Some(SignalSource::Filename),
            year: Some(1999),
            ..MediaSignals::default()
        };
        unit
    }

    #[test]
    fn unknown_units_score_zero() {
        let mut unit = MediaUnit::new("/src/stuff");
        unit.kind = UnitKind::Unknown;
        let score = score_unit(&unit);
        assert_eq!(score.confidence, 0);
    }

    #[test]
    fn movie_with_title_and_year() {
        let score = score_unit(&movie_unit());
        // 10 (filename title) + 15 (year)
        assert_eq!(score.confidence, 25);
    }

    #[test]
    fn sidecar_ids_dominate() {
        let mut unit = movie_unit();
        unit.signals.title_source = Some(SignalSource::Sidecar);
        unit.signals.ids = ExternalIds {
            imdb: Some("tt0133093".into()),
            tmdb: Some("603".into()),
            ..ExternalIds::default()
        };
        let score = score_unit(&unit);
        // 50 (imdb only, not tmdb too) + 20 (sidecar title) + 15 (year)
        assert_eq!(score.confidence, 85);
    }

    #[test]
    fn provider_corroboration_adds_points() {
        let mut unit = movie_unit();
        unit.signals.ids.imdb = Some("tt0133093".into());
        unit.signals.provider = Some(ProviderCorroboration {
            id_match: true,
            title_year_match: true,
        });
        // 50 + 10 + 15 + 15 + 10
        assert_eq!(score_unit(&unit).confidence, 100);
    }

    #[test]
    fn show_scoring_uses_episode_signals() {
        let mut unit = MediaUnit::new("/src/Show");
        unit.kind = UnitKind::Show;
        let mut primary = PrimaryFile::new(FileRecord::new("/src/Show/S01E01.mkv", 1024));
        primary.signals.season = Some(1);
        primary.signals.episodes = vec![1];
        primary.signals.episode_title = Some("Pilot".into());
        unit.primaries.push(primary);
        unit.signals.title = Some("Show".into());
        unit.signals.title_source = Some(SignalSource::Folder);

        let score = score_unit(&unit);
        // 10 (title) + 20 (S/E) + 10 (episode title)
        assert_eq!(score.confidence, 40);
    }

    #[test]
    fn warnings_subtract_points() {
        let mut unit = movie_unit();
        unit.warnings.push("malformed sidecar metadata".into());
        assert_eq!(score_unit(&unit).confidence, 20);
    }

    #[test]
    fn identical_signals_identical_scores() {
        let unit = movie_unit();
        assert_eq!(score_unit(&unit), score_unit(&unit));
    }

    #[test]
    fn confidence_never_leaves_bounds() {
        let mut unit = MediaUnit::new("/src/x");
        unit.kind = UnitKind::Movie;
        for i in 0..10 {
            unit.warnings.push(format!("warning {i}"));
        }
        let score = score_unit(&unit);
        assert_eq!(score.confidence, 0);
    }
}
