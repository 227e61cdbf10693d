//! Shelvex CLI: plan and apply media library reorganizations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use shelvex_config::{Config, ConfigSource, validate};
use shelvex_core::{Engine, MediaUnitView, MoveProgress, ProviderManager, Scanner};
use shelvex_model::{ConflictPolicy, MoveResult};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shelvexctl",
    about = "Reorganize a media collection into a canonical library layout",
    version
)]
struct Cli {
    /// Path to a TOML or JSON config file (overrides the environment).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and classify, printing planned destinations without moving
    /// anything.
    Plan {
        /// Source root to scan (defaults to the configured one).
        source: Option<PathBuf>,
    },
    /// Execute the plan as transactional per-unit moves.
    Apply {
        /// Source root to scan (defaults to the configured one).
        source: Option<PathBuf>,

        /// Actually move files. Without this flag apply runs the full
        /// pipeline in dry-run mode.
        #[arg(long)]
        execute: bool,

        /// Skip the confirmation requirement for --execute.
        #[arg(long)]
        yes: bool,

        /// Conflict policy override: skip, replace, or keep-both.
        #[arg(long)]
        policy: Option<ConflictPolicy>,

        /// Also execute yellow-band units (green only by default).
        #[arg(long)]
        include_yellow: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let (config, source) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("config error: {err:#}");
            std::process::exit(2);
        }
    };
    debug!("configuration loaded from {source:?}");

    for warning in validate(&config) {
        eprintln!("warning: {warning}");
    }
    if config.providers.enabled {
        eprintln!("warning: providers.enabled is set but no provider is compiled in; running offline");
    }

    match cli.command {
        Command::Plan { source } => run_plan(config, source).await,
        Command::Apply {
            source,
            execute,
            yes,
            policy,
            include_yellow,
        } => run_apply(config, source, execute, yes, policy, include_yellow).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<(Config, ConfigSource)> {
    match path {
        Some(path) => {
            let config = Config::load_from_path(path)?;
            Ok((config, ConfigSource::File(path.to_path_buf())))
        }
        None => Config::load_from_env(),
    }
}

async fn build_views(
    config: &Config,
    source_override: Option<PathBuf>,
) -> anyhow::Result<(Engine, Vec<MediaUnitView>)> {
    let mut engine_config = config.engine_config();
    if let Some(source) = source_override {
        engine_config.source_root = source;
    }
    if engine_config.source_root.as_os_str().is_empty() {
        bail!("no source root: pass one as an argument or set paths.source");
    }
    let source_root = engine_config.source_root.clone();

    let scanner = Scanner::new(config.scanner_extensions(), false);
    let outcome = scanner.scan(&source_root);
    for error in &outcome.errors {
        eprintln!(
            "scan error: {} ({})",
            error.message,
            error
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown path".into())
        );
    }

    let engine = Engine::new(engine_config, Arc::new(ProviderManager::disabled()));
    let views = engine
        .plan(&outcome.records)
        .await
        .context("planning failed")?;
    Ok((engine, views))
}

async fn run_plan(config: Config, source: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, views) = build_views(&config, source).await?;

    if views.is_empty() {
        println!("nothing to plan");
        return Ok(());
    }

    for view in &views {
        println!(
            "[{}] {} {} ({}%)",
            view.band,
            view.kind,
            view.unit_root.display(),
            view.confidence
        );
        if let Some(title) = &view.title {
            match view.year {
                Some(year) => println!("    title: {title} ({year})"),
                None => println!("    title: {title}"),
            }
        }
        for file in &view.files {
            println!("    {} -> {}", file.source.display(), file.destination.display());
        }
        for warning in &view.warnings {
            println!("    warning: {warning}");
        }
    }

    let excluded = views.iter().filter(|v| !v.is_executable()).count();
    if excluded > 0 {
        println!("{excluded} unit(s) excluded from planning (unknown or flagged)");
    }
    Ok(())
}

async fn run_apply(
    mut config: Config,
    source: Option<PathBuf>,
    execute: bool,
    yes: bool,
    policy: Option<ConflictPolicy>,
    include_yellow: bool,
) -> anyhow::Result<()> {
    if execute && !yes {
        bail!("refusing to move files without --yes (or drop --execute for a dry run)");
    }
    if let Some(policy) = policy {
        config.mover.conflict_policy = policy;
    }

    let (engine, views) = build_views(&config, source).await?;

    let selected: Vec<MediaUnitView> = views
        .into_iter()
        .filter(|view| view.is_executable())
        .filter(|view| match view.band {
            shelvex_model::ConfidenceBand::Green => true,
            shelvex_model::ConfidenceBand::Yellow => include_yellow,
            shelvex_model::ConfidenceBand::Red => false,
        })
        .collect();

    if selected.is_empty() {
        println!("no units selected for execution");
        return Ok(());
    }

    let dry_run = !execute;
    println!(
        "{} {} unit(s)...",
        if dry_run { "previewing" } else { "moving" },
        selected.len()
    );

    let mut handle = engine.execute(&selected, dry_run);
    while let Some(event) = handle.progress_rx.recv().await {
        render_progress(&event);
    }
    let results = handle
        .wait()
        .await
        .context("move execution failed")?;

    let failed = render_results(&results, dry_run);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn render_progress(event: &MoveProgress) {
    match event {
        MoveProgress::UnitStarted {
            unit_root, files, ..
        } => println!("unit {unit_root}: {files} file(s)"),
        MoveProgress::FileStarted {
            destination,
            index,
            total,
            ..
        } => println!("  [{index}/{total}] -> {destination}"),
        MoveProgress::Error { unit_root, error } => {
            eprintln!("  error in {unit_root}: {error}");
        }
        MoveProgress::UnitFinished {
            unit_root,
            rolled_back,
            partially_applied,
        } => {
            if *rolled_back && *partially_applied {
                eprintln!("unit {unit_root}: failed, partially applied (committed moves kept)");
            } else if *rolled_back {
                eprintln!("unit {unit_root}: failed, fully reverted");
            }
        }
        _ => {}
    }
}

fn render_results(results: &[MoveResult], dry_run: bool) -> usize {
    let mut failed = 0;
    for result in results {
        let verb = if dry_run { "would place" } else { "placed" };
        println!(
            "{}: {verb} {} file(s), skipped {}, errors {}",
            result.unit_root.display(),
            result.files_placed(),
            result.skipped.len(),
            result.errors.len()
        );
        if !result.success() {
            failed += 1;
            for error in &result.errors {
                eprintln!("  {error}");
            }
        }
    }
    failed
}
