//! Move transactions: the unit of atomicity.
//!
//! A transaction covers exactly one media unit. Its operations are
//! arranged in groups of one primary followed by that primary's
//! companions; groups may execute in parallel, but within a group the
//! primary always moves first so a companion never points at an unplaced
//! primary.

use std::path::PathBuf;

use shelvex_model::{ConflictPolicy, DestinationPlan, OpState};
use uuid::Uuid;

/// How the conflict pass resolved an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAction {
    /// No conflict; plain move.
    Move,
    /// Destination existed; this file is dropped.
    Skip,
    /// Destination existed and is displaced aside until commit.
    Replace,
    /// Destination renamed with a ` (n)` suffix.
    KeepBoth,
}

/// One file move with its full runtime bookkeeping.
#[derive(Debug, Clone)]
pub struct FileMoveOperation {
    pub source: PathBuf,
    /// Final destination after conflict resolution.
    pub destination: PathBuf,
    /// Destination as originally planned, before any ` (n)` suffixing.
    pub planned_destination: PathBuf,
    pub size_bytes: u64,
    pub same_volume: bool,
    pub state: OpState,
    pub action: ResolvedAction,
    /// Temporary name the cross-volume copy streams into.
    pub temp_path: Option<PathBuf>,
    /// Where a Replace moved the pre-existing destination file.
    pub displaced_path: Option<PathBuf>,
    /// Where the source was parked before final deletion (cross volume).
    pub quarantine_path: Option<PathBuf>,
    /// Failure recorded for this operation, if any.
    pub failure: Option<String>,
}

impl FileMoveOperation {
    fn from_plan(plan: &DestinationPlan, size_bytes: u64, same_volume: bool) -> Self {
        Self {
            source: plan.source.clone(),
            destination: plan.destination.clone(),
            planned_destination: plan.destination.clone(),
            size_bytes,
            same_volume,
            state: OpState::Pending,
            action: ResolvedAction::Move,
            temp_path: None,
            displaced_path: None,
            quarantine_path: None,
            failure: None,
        }
    }
}

/// One primary and its companions, in execution order.
#[derive(Debug, Clone)]
pub struct OpGroup {
    pub ops: Vec<FileMoveOperation>,
}

impl OpGroup {
    pub fn primary(&self) -> &FileMoveOperation {
        &self.ops[0]
    }
}

/// All operations for one unit, plus the bookkeeping needed to undo
/// anything that has not committed.
#[derive(Debug)]
pub struct MoveTransaction {
    pub id: Uuid,
    pub unit_root: PathBuf,
    pub groups: Vec<OpGroup>,
    pub policy: ConflictPolicy,
    pub dry_run: bool,
    /// Directories this transaction created, deepest last; removed again
    /// (if still empty) on rollback.
    pub created_dirs: Vec<PathBuf>,
}

impl MoveTransaction {
    /// Build a transaction from a unit's plans. `probe_size` and
    /// `probe_volume` supply filesystem facts so tests can substitute
    /// their own.
    pub fn build(
        unit_root: PathBuf,
        plans: &[DestinationPlan],
        probe_size: impl Fn(&PathBuf) -> u64,
        probe_volume: impl Fn(&PathBuf, &PathBuf) -> bool,
    ) -> Self {
        let policy = plans.first().map(|p| p.policy).unwrap_or_default();
        let dry_run = plans.first().map(|p| p.dry_run).unwrap_or(true);

        let mut groups: Vec<OpGroup> = Vec::new();
        for plan in plans {
            let op = FileMoveOperation::from_plan(
                plan,
                probe_size(&plan.source),
                probe_volume(&plan.source, &plan.destination),
            );
            match &plan.owner {
                Some(owner) => {
                    if let Some(group) = groups
                        .iter_mut()
                        .find(|g| &g.primary().source == owner)
                    {
                        group.ops.push(op);
                    } else {
                        // Orphaned companion plan; runs as its own group.
                        groups.push(OpGroup { ops: vec![op] });
                    }
                }
                None => groups.push(OpGroup { ops: vec![op] }),
            }
        }

        Self {
            id: Uuid::new_v4(),
            unit_root,
            groups,
            policy,
            dry_run,
            created_dirs: Vec::new(),
        }
    }

    pub fn ops(&self) -> impl Iterator<Item = &FileMoveOperation> {
        self.groups.iter().flat_map(|g| g.ops.iter())
    }

    pub fn op_count(&self) -> usize {
        self.groups.iter().map(|g| g.ops.len()).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.ops().map(|op| op.size_bytes).sum()
    }

    pub fn cross_volume_bytes(&self) -> u64 {
        self.ops()
            .filter(|op| !op.same_volume)
            .map(|op| op.size_bytes)
            .sum()
    }

    pub fn any_committed(&self) -> bool {
        self.ops().any(|op| op.state == OpState::Committed)
    }
}
