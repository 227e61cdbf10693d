//! Engine facade: the exposed surface of the pipeline.
//!
//! `plan` runs group -> identify -> score -> plan and returns one view
//! per unit; `execute` applies the selected views as transactional moves
//! and returns a handle carrying the progress stream, per-unit results,
//! and cooperative cancellation. Dry-run and real execution share every
//! code path except the terminal filesystem mutation, so preview and
//! execution cannot diverge in logic.

use std::path::PathBuf;
use std::sync::Arc;

use shelvex_model::{
    ConfidenceBand, ConfidenceThresholds, ConflictPolicy, DestinationPlan, FileRecord,
    ScoreReason, UnitKind,
};
use tracing::{info, warn};

use crate::error::Result;
use crate::grouper::{self, GroupingRules};
use crate::identifier::Identifier;
use crate::identifier::title::TitleRules;
use crate::mover::{Mover, MoveHandle, MoverConfig, UnitPlans};
use crate::planner::Planner;
use crate::planner::sanitize::NamingRules;
use crate::providers::ProviderManager;
use crate::scorer;

/// Everything the engine needs, assembled by the caller (usually from
/// `shelvex-config`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub source_root: PathBuf,
    pub movies_root: PathBuf,
    pub shows_root: PathBuf,
    pub grouping: GroupingRules,
    pub title_rules: TitleRules,
    pub naming: NamingRules,
    pub thresholds: ConfidenceThresholds,
    pub conflict_policy: ConflictPolicy,
    pub dry_run: bool,
    pub strict_grouping: bool,
    pub mover: MoverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            movies_root: PathBuf::new(),
            shows_root: PathBuf::new(),
            grouping: GroupingRules::default(),
            title_rules: TitleRules::default(),
            naming: NamingRules::default(),
            thresholds: ConfidenceThresholds::default(),
            conflict_policy: ConflictPolicy::default(),
            dry_run: true,
            strict_grouping: true,
            mover: MoverConfig::default(),
        }
    }
}

/// One file's planned placement inside a unit view.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FilePlanView {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Owning primary's source path when this file is a companion.
    pub owner: Option<PathBuf>,
}

/// Per-unit outcome of a planning pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MediaUnitView {
    pub unit_root: PathBuf,
    pub kind: UnitKind,
    pub title: Option<String>,
    pub year: Option<u16>,
    pub confidence: u8,
    pub band: ConfidenceBand,
    pub reasons: Vec<ScoreReason>,
    pub warnings: Vec<String>,
    /// Planned placements; empty for Unknown or collision-skipped units.
    pub files: Vec<FilePlanView>,
    pub total_bytes: u64,
}

impl MediaUnitView {
    pub fn is_executable(&self) -> bool {
        !self.files.is_empty()
    }
}

pub struct Engine {
    config: EngineConfig,
    identifier: Identifier,
    planner: Planner,
    mover: Arc<Mover>,
}

impl Engine {
    pub fn new(config: EngineConfig, providers: Arc<ProviderManager>) -> Self {
        let identifier = Identifier::new(
            config.title_rules.clone(),
            config.strict_grouping,
            providers,
        );
        let planner = Planner::new(
            config.movies_root.clone(),
            config.shows_root.clone(),
            config.naming.clone(),
        );
        let mover = Arc::new(Mover::new(config.mover.clone(), config.naming.clone()));
        Self {
            config,
            identifier,
            planner,
            mover,
        }
    }

    pub fn offline(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(ProviderManager::disabled()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Group, identify, score, and plan the scanned records.
    pub async fn plan(&self, records: &[FileRecord]) -> Result<Vec<MediaUnitView>> {
        let mut units = grouper::build_units(
            records,
            &self.config.source_root,
            &self.config.grouping,
        );
        info!(
            "grouped {} records into {} units",
            records.len(),
            units.len()
        );

        let mut views = Vec::with_capacity(units.len());
        for unit in &mut units {
            self.identifier.identify(unit, &self.config.grouping).await;
            let score = scorer::score_unit(unit);

            let (files, mut warnings) = if unit.kind.is_plannable() {
                match self.planner.plan_unit(
                    unit,
                    self.config.conflict_policy,
                    self.config.dry_run,
                ) {
                    Ok(plans) => (
                        plans
                            .iter()
                            .map(|p| FilePlanView {
                                source: p.source.clone(),
                                destination: p.destination.clone(),
                                owner: p.owner.clone(),
                            })
                            .collect(),
                        Vec::new(),
                    ),
                    Err(err) => {
                        // Invariant violation: the unit is excluded from
                        // execution rather than risking data loss.
                        warn!("planning failed for {}: {err}", unit.root.display());
                        (Vec::new(), vec![format!("planning failed: {err}")])
                    }
                }
            } else {
                (Vec::new(), Vec::new())
            };
            warnings.extend(unit.warnings.iter().cloned());

            views.push(MediaUnitView {
                unit_root: unit.root.clone(),
                kind: unit.kind,
                title: unit.signals.title.clone(),
                year: unit.signals.year,
                confidence: score.confidence,
                band: self.config.thresholds.band(score.confidence),
                reasons: score.reasons,
                warnings,
                files,
                total_bytes: unit.total_bytes(),
            });
        }
        Ok(views)
    }

    /// Execute the selected unit views. `dry_run` reuses the identical
    /// preflight and conflict-resolution path with a no-op terminal
    /// mutation.
    pub fn execute(&self, selected: &[MediaUnitView], dry_run: bool) -> MoveHandle {
        let units: Vec<UnitPlans> = selected
            .iter()
            .filter(|view| view.is_executable())
            .map(|view| UnitPlans {
                unit_root: view.unit_root.clone(),
                plans: view
                    .files
                    .iter()
                    .map(|file| DestinationPlan {
                        source: file.source.clone(),
                        destination: file.destination.clone(),
                        naming: Default::default(),
                        policy: self.config.conflict_policy,
                        dry_run,
                        owner: file.owner.clone(),
                    })
                    .collect(),
            })
            .collect();
        self.mover.clone().execute(units, dry_run)
    }
}
