//! End-to-end planning: scan -> group -> identify -> score -> plan.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use shelvex_core::{Engine, EngineConfig, GroupingRules, MediaUnitView, Scanner};
use shelvex_model::{ConfidenceBand, UnitKind};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    movies: PathBuf,
    shows: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("incoming");
        let movies = dir.path().join("library/Movies");
        let shows = dir.path().join("library/Shows");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&movies).unwrap();
        fs::create_dir_all(&shows).unwrap();
        Self {
            _dir: dir,
            source,
            movies,
            shows,
        }
    }

    fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.source.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn engine(&self) -> Engine {
        self.engine_with(|_| {})
    }

    fn engine_with(&self, tweak: impl FnOnce(&mut EngineConfig)) -> Engine {
        let mut config = EngineConfig {
            source_root: self.source.clone(),
            movies_root: self.movies.clone(),
            shows_root: self.shows.clone(),
            ..EngineConfig::default()
        };
        tweak(&mut config);
        Engine::offline(config)
    }

    async fn plan(&self, engine: &Engine) -> Vec<MediaUnitView> {
        let extensions: HashSet<String> = {
            let rules = GroupingRules::default();
            rules
                .video_extensions
                .iter()
                .chain(rules.companion_extensions.iter())
                .cloned()
                .collect()
        };
        let outcome = Scanner::new(extensions, false).scan(&self.source);
        assert!(outcome.errors.is_empty(), "scan errors: {:?}", outcome.errors);
        engine.plan(&outcome.records).await.unwrap()
    }
}

fn destinations(view: &MediaUnitView) -> Vec<&Path> {
    view.files.iter().map(|f| f.destination.as_path()).collect()
}

#[tokio::test]
async fn movie_with_subtitle_plans_as_one_unit() {
    let fx = Fixture::new();
    fx.write("Movies/The Matrix (1999)/the.matrix.1999.mkv", b"video");
    fx.write("Movies/The Matrix (1999)/the.matrix.1999.srt", b"subs");

    let engine = fx.engine();
    let views = fx.plan(&engine).await;

    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.kind, UnitKind::Movie);
    assert_eq!(view.title.as_deref(), Some("The Matrix"));
    assert_eq!(view.year, Some(1999));
    assert_eq!(
        destinations(view),
        vec![
            fx.movies.join("The Matrix (1999)/The Matrix (1999).mkv"),
            fx.movies.join("The Matrix (1999)/The Matrix (1999).srt"),
        ]
    );
    // The companion points back at its primary.
    assert_eq!(
        view.files[1].owner.as_deref(),
        Some(view.files[0].source.as_path())
    );
}

#[tokio::test]
async fn two_episodes_plan_under_one_season() {
    let fx = Fixture::new();
    fx.write("Show/Season 01/Show.S01E01.mkv", b"e1");
    fx.write("Show/Season 01/Show.S01E02.mkv", b"e2");

    let engine = fx.engine();
    let views = fx.plan(&engine).await;

    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.kind, UnitKind::Show);
    assert_eq!(
        destinations(view),
        vec![
            fx.shows.join("Show/Season 01/Show - S01E01.mkv"),
            fx.shows.join("Show/Season 01/Show - S01E02.mkv"),
        ]
    );
}

#[tokio::test]
async fn mixed_content_is_flagged_and_excluded() {
    let fx = Fixture::new();
    fx.write("grab bag/Heat.1995.mkv", b"a");
    fx.write("grab bag/Ronin.1998.mkv", b"b");

    let engine = fx.engine(); // strict grouping is the default
    let views = fx.plan(&engine).await;

    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.kind, UnitKind::Unknown);
    assert_eq!(view.band, ConfidenceBand::Red);
    assert!(view.warnings.iter().any(|w| w.contains("mixed content")));
    assert!(view.files.is_empty(), "unknown units must not be planned");
}

#[tokio::test]
async fn sidecar_nfo_beats_filename_signals() {
    let fx = Fixture::new();
    fx.write("rips/badly.named.file.mkv", b"video");
    fx.write(
        "rips/badly.named.file.nfo",
        br#"<movie>
              <title>Heat</title>
              <year>1995</year>
              <imdbid>0113277</imdbid>
              <tmdbid>949</tmdbid>
            </movie>"#,
    );

    let engine = fx.engine();
    let views = fx.plan(&engine).await;

    let view = &views[0];
    assert_eq!(view.kind, UnitKind::Movie);
    assert_eq!(view.title.as_deref(), Some("Heat"));
    assert_eq!(view.year, Some(1995));
    assert_eq!(view.band, ConfidenceBand::Green);
    // The id tag flows into the destination grammar.
    assert_eq!(
        view.files[0].destination,
        fx.movies.join("Heat (1995) [tmdbid-949]/Heat (1995) [tmdbid-949].mkv")
    );
}

#[tokio::test]
async fn malformed_nfo_downgrades_to_filename_signals() {
    let fx = Fixture::new();
    fx.write("rips/The Big Heist (2003)/the.big.heist.2003.mkv", b"video");
    fx.write(
        "rips/The Big Heist (2003)/the.big.heist.2003.nfo",
        b"<movie><title>Broken",
    );

    let engine = fx.engine();
    let views = fx.plan(&engine).await;

    let view = &views[0];
    assert_eq!(view.kind, UnitKind::Movie);
    assert_eq!(view.title.as_deref(), Some("The Big Heist"));
    assert_eq!(view.year, Some(2003));
    assert!(
        view.warnings
            .iter()
            .any(|w| w.contains("malformed sidecar metadata"))
    );
}

#[tokio::test]
async fn planning_twice_is_identical() {
    let fx = Fixture::new();
    fx.write("Show/Season 01/Show.S01E01.mkv", b"e1");
    fx.write("Movies/Heat (1995)/heat.mkv", b"m");

    let engine = fx.engine();
    let first = fx.plan(&engine).await;
    let second = fx.plan(&engine).await;

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.unit_root, b.unit_root);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.files, b.files);
    }
}

#[tokio::test]
async fn specials_plan_into_season_zero() {
    let fx = Fixture::new();
    fx.write("Show/Specials/Show.S00E01.mkv", b"special");

    let engine = fx.engine();
    let views = fx.plan(&engine).await;

    assert_eq!(
        destinations(&views[0]),
        vec![fx.shows.join("Show/Season 00/Show - S00E01.mkv")]
    );
}
