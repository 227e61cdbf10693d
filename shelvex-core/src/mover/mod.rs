//! Transactional move execution.
//!
//! The mover applies one unit's destination plans so that either every
//! file ends up correctly placed or all work that has not irrevocably
//! committed is undone. Same-volume moves are single atomic renames;
//! cross-volume moves stream to a temporary name, verify, rename into
//! place, and only then remove the source, so at every observable instant
//! either the source or a verified destination copy exists.
//!
//! Units execute as independent tasks with isolated rollback state; a
//! bounded semaphore pair (local / network destinations) caps concurrent
//! file operations across all units. Progress is reported on a channel
//! consumable as a stream, and cancellation is cooperative: polled
//! between operations and at copy checkpoints, routing through the same
//! rollback path as a failure.

pub mod conflict;
pub mod executor;
pub mod preflight;
pub mod transaction;
pub mod volume;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use shelvex_model::{DestinationPlan, MoveError, MoveErrorKind, MoveResult, OpState};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::planner::sanitize::NamingRules;
use transaction::{MoveTransaction, ResolvedAction};

/// Retry policy for transient I/O errors.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 100,
        }
    }
}

/// Fault points for transactional tests (active only with the
/// `test-support` feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    BeforeRename,
    AfterCopy,
    AfterVerify,
}

/// Injected failure: the operation whose source path contains
/// `path_contains` fails at `point`.
#[derive(Debug, Clone)]
pub struct FaultInjection {
    pub point: FaultPoint,
    pub path_contains: String,
}

/// Mover tuning.
#[derive(Debug, Clone)]
pub struct MoverConfig {
    /// Concurrent file operations against local-volume destinations.
    pub concurrency_local: usize,
    /// Concurrent file operations against network destinations. Network
    /// shares degrade badly under parallel writes, so this defaults low.
    pub concurrency_network: usize,
    /// Path prefixes treated as network destinations (UNC paths are
    /// always treated as network).
    pub network_mounts: Vec<PathBuf>,
    /// Safety margin subtracted from destination free space.
    pub free_space_margin_bytes: u64,
    /// Maximum destination path length; longer paths fail preflight.
    pub path_length_limit: usize,
    /// Progress channel buffer size.
    pub progress_buffer: usize,
    /// Stream-copy chunk size for cross-volume moves.
    pub copy_buffer_bytes: usize,
    pub retry: RetryConfig,
    /// Treat every operation as cross-volume (test-support only).
    #[cfg(feature = "test-support")]
    pub force_cross_volume: bool,
    /// Injected failure for atomicity tests (test-support only).
    #[cfg(feature = "test-support")]
    pub fault: Option<FaultInjection>,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            concurrency_local: 8,
            concurrency_network: 2,
            network_mounts: Vec::new(),
            free_space_margin_bytes: 100 * 1024 * 1024,
            path_length_limit: 255,
            progress_buffer: 1024,
            copy_buffer_bytes: 1024 * 1024,
            retry: RetryConfig::default(),
            #[cfg(feature = "test-support")]
            force_cross_volume: false,
            #[cfg(feature = "test-support")]
            fault: None,
        }
    }
}

impl MoverConfig {
    /// Whether a destination counts against the network concurrency cap.
    pub fn is_network_destination(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        if text.starts_with("//") || text.starts_with(r"\\") {
            return true;
        }
        self.network_mounts.iter().any(|m| path.starts_with(m))
    }
}

/// Progress events emitted while executing a run.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveProgress {
    RunStarted {
        run_id: Uuid,
        units: usize,
        dry_run: bool,
    },
    UnitStarted {
        unit_root: String,
        files: usize,
        bytes: u64,
    },
    FileStarted {
        source: String,
        destination: String,
        index: usize,
        total: usize,
    },
    BytesCopied {
        source: String,
        bytes_copied: u64,
        bytes_total: u64,
    },
    FileFinished {
        destination: String,
        state: OpState,
    },
    UnitFinished {
        unit_root: String,
        rolled_back: bool,
        partially_applied: bool,
    },
    RunFinished {
        run_id: Uuid,
        units_ok: usize,
        units_failed: usize,
        duration_secs: u64,
    },
    Error {
        unit_root: String,
        error: MoveError,
    },
}

/// Plans for one unit, as selected for execution.
#[derive(Debug, Clone)]
pub struct UnitPlans {
    pub unit_root: PathBuf,
    pub plans: Vec<DestinationPlan>,
}

/// Handle to a running move execution.
pub struct MoveHandle {
    pub run_id: Uuid,
    pub progress_rx: mpsc::Receiver<MoveProgress>,
    cancel: CancellationToken,
    join_handle: JoinHandle<Result<Vec<MoveResult>>>,
}

impl MoveHandle {
    /// Request cooperative cancellation. In-flight copies run to their
    /// next safe checkpoint before honoring it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for every unit to finish and collect the per-unit results.
    pub async fn wait(self) -> Result<Vec<MoveResult>> {
        self.join_handle
            .await
            .map_err(|e| EngineError::Internal(format!("move task failed: {e}")))?
    }

    /// Consume the handle, returning the progress stream and a join
    /// future for the results.
    pub fn into_parts(
        self,
    ) -> (
        impl futures::Stream<Item = MoveProgress>,
        JoinHandle<Result<Vec<MoveResult>>>,
        CancellationToken,
    ) {
        (
            tokio_stream::wrappers::ReceiverStream::new(self.progress_rx),
            self.join_handle,
            self.cancel,
        )
    }
}

/// Shared execution context for one run.
pub(crate) struct ExecCtx {
    pub config: MoverConfig,
    pub naming: NamingRules,
    pub local_permits: Arc<Semaphore>,
    pub network_permits: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub progress: mpsc::Sender<MoveProgress>,
}

impl ExecCtx {
    pub fn permits_for(&self, destination: &Path) -> Arc<Semaphore> {
        if self.config.is_network_destination(destination) {
            self.network_permits.clone()
        } else {
            self.local_permits.clone()
        }
    }
}

pub struct Mover {
    config: MoverConfig,
    naming: NamingRules,
}

impl Mover {
    pub fn new(config: MoverConfig, naming: NamingRules) -> Self {
        Self { config, naming }
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    /// Execute the selected units. Returns immediately with a handle;
    /// the work runs on the tokio runtime.
    pub fn execute(self: Arc<Self>, units: Vec<UnitPlans>, dry_run: bool) -> MoveHandle {
        let run_id = Uuid::new_v4();
        let (progress_tx, progress_rx) = mpsc::channel(self.config.progress_buffer);
        let cancel = CancellationToken::new();

        let ctx = Arc::new(ExecCtx {
            config: self.config.clone(),
            naming: self.naming.clone(),
            local_permits: Arc::new(Semaphore::new(self.config.concurrency_local.max(1))),
            network_permits: Arc::new(Semaphore::new(self.config.concurrency_network.max(1))),
            cancel: cancel.clone(),
            progress: progress_tx,
        });

        let join_handle = tokio::spawn(async move {
            let started = Instant::now();
            let _ = ctx
                .progress
                .send(MoveProgress::RunStarted {
                    run_id,
                    units: units.len(),
                    dry_run,
                })
                .await;

            let mut set = JoinSet::new();
            for unit in units {
                let ctx = ctx.clone();
                set.spawn(async move { execute_unit(unit, dry_run, ctx).await });
            }

            let mut results = Vec::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(result) => results.push(result),
                    Err(err) => error!("unit task panicked: {err}"),
                }
            }
            results.sort_by(|a, b| a.unit_root.cmp(&b.unit_root));

            let units_failed = results.iter().filter(|r| !r.success()).count();
            let _ = ctx
                .progress
                .send(MoveProgress::RunFinished {
                    run_id,
                    units_ok: results.len() - units_failed,
                    units_failed,
                    duration_secs: started.elapsed().as_secs(),
                })
                .await;

            info!(
                "move run {run_id} finished: {} units, {units_failed} failed",
                results.len()
            );
            Ok(results)
        });

        MoveHandle {
            run_id,
            progress_rx,
            cancel,
            join_handle,
        }
    }
}

/// Execute one unit's transaction: preflight, conflict resolution,
/// grouped execution, then rollback or finalize.
async fn execute_unit(unit: UnitPlans, dry_run: bool, ctx: Arc<ExecCtx>) -> MoveResult {
    let mut result = MoveResult::new(&unit.unit_root);

    #[cfg(feature = "test-support")]
    let force_cross = ctx.config.force_cross_volume;
    #[cfg(not(feature = "test-support"))]
    let force_cross = false;

    let mut tx = MoveTransaction::build(
        unit.unit_root.clone(),
        &unit.plans,
        |source| std::fs::metadata(source).map(|m| m.len()).unwrap_or(0),
        |source, destination| !force_cross && volume::same_volume(source, destination),
    );
    tx.dry_run = dry_run;

    let _ = ctx
        .progress
        .send(MoveProgress::UnitStarted {
            unit_root: unit.unit_root.display().to_string(),
            files: tx.op_count(),
            bytes: tx.total_bytes(),
        })
        .await;

    // Preflight: read-only, aborts with zero side effects.
    let report = preflight::run_preflight(&tx, &ctx.naming, &ctx.config);
    if !report.passed() {
        result.errors.push(
            MoveError::new(
                MoveErrorKind::Config,
                format!("preflight failed: {}", report.errors.join("; ")),
            )
            .with_paths(Some(unit.unit_root.clone()), None),
        );
        let _ = ctx
            .progress
            .send(MoveProgress::UnitFinished {
                unit_root: unit.unit_root.display().to_string(),
                rolled_back: false,
                partially_applied: false,
            })
            .await;
        return result;
    }

    // Conflict resolution, shared verbatim between dry-run and real runs.
    for group in &mut tx.groups {
        conflict::resolve_group(group, tx.policy);
    }

    let failed = Arc::new(AtomicBool::new(false));
    let created_dirs = Arc::new(std::sync::Mutex::new(Vec::<PathBuf>::new()));
    let op_counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let total_ops = tx.op_count();

    let mut group_set = JoinSet::new();
    for (index, group) in tx.groups.drain(..).enumerate() {
        let ctx = ctx.clone();
        let failed = failed.clone();
        let op_counter = op_counter.clone();
        let created_dirs = created_dirs.clone();
        let unit_root = unit.unit_root.clone();
        group_set.spawn(async move {
            let group = executor::run_group(
                group, dry_run, total_ops, unit_root, ctx, failed, op_counter, created_dirs,
            )
            .await;
            (index, group)
        });
    }

    let mut finished: Vec<(usize, transaction::OpGroup)> = Vec::new();
    while let Some(joined) = group_set.join_next().await {
        match joined {
            Ok(entry) => finished.push(entry),
            Err(err) => {
                error!("group task panicked: {err}");
                failed.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }
    finished.sort_by_key(|(index, _)| *index);
    tx.groups = finished.into_iter().map(|(_, group)| group).collect();
    {
        let mut dirs = created_dirs.lock().unwrap_or_else(|e| e.into_inner());
        tx.created_dirs = std::mem::take(&mut *dirs);
    }

    let was_cancelled = ctx.cancel.is_cancelled();
    let unit_failed = failed.load(std::sync::atomic::Ordering::SeqCst);

    if unit_failed || was_cancelled {
        executor::rollback(&mut tx).await;
        result.rolled_back = true;
        result.partially_applied = tx.any_committed();
        if was_cancelled {
            result.errors.push(
                MoveError::new(MoveErrorKind::Cancelled, "execution cancelled")
                    .with_paths(Some(unit.unit_root.clone()), None),
            );
        }
    } else {
        executor::finalize(&mut tx).await;
    }

    collect_result(&tx, &mut result);

    let _ = ctx
        .progress
        .send(MoveProgress::UnitFinished {
            unit_root: unit.unit_root.display().to_string(),
            rolled_back: result.rolled_back,
            partially_applied: result.partially_applied,
        })
        .await;

    if result.rolled_back {
        warn!(
            "unit {} rolled back ({} committed ops kept)",
            unit.unit_root.display(),
            result.files_placed()
        );
    } else {
        debug!(
            "unit {} finished: {} placed, {} skipped",
            unit.unit_root.display(),
            result.files_placed(),
            result.skipped.len()
        );
    }
    result
}

/// Fold terminal op states into the unit's result lists.
fn collect_result(tx: &MoveTransaction, result: &mut MoveResult) {
    for op in tx.ops() {
        match (op.state, op.action) {
            (OpState::Committed, ResolvedAction::Move) => {
                result.moved.push(op.destination.clone());
            }
            (OpState::Committed, ResolvedAction::Replace) => {
                result.replaced.push(op.destination.clone());
            }
            (OpState::Committed, ResolvedAction::KeepBoth) => {
                result.kept_both.push(op.destination.clone());
            }
            (_, ResolvedAction::Skip) => {
                result.skipped.push(op.destination.clone());
            }
            (OpState::Failed, _) => {
                result.errors.push(
                    MoveError::new(
                        MoveErrorKind::Transaction,
                        op.failure.clone().unwrap_or_else(|| "operation failed".into()),
                    )
                    .with_paths(Some(op.source.clone()), Some(op.destination.clone())),
                );
            }
            _ => {}
        }
    }
}
