use std::fmt::{self, Display};
use std::path::PathBuf;

/// Lifecycle of one file-move operation.
///
/// Same volume: `Pending -> Renamed -> Committed`.
/// Cross volume: `Pending -> Copying -> Copied -> Verifying -> Verified
/// -> SourceQuarantined -> Committed`.
/// `Failed` is reachable from any non-terminal state; `RolledBack` from
/// `Failed` or cooperative cancellation. `Committed` is never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpState {
    Pending,
    Renamed,
    Copying,
    Copied,
    Verifying,
    Verified,
    SourceQuarantined,
    Committed,
    Failed,
    RolledBack,
}

impl OpState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OpState::Committed | OpState::Failed | OpState::RolledBack
        )
    }

    /// States where a destination-side copy exists but the operation has
    /// not committed; rollback must delete that copy.
    pub fn has_uncommitted_copy(&self) -> bool {
        matches!(
            self,
            OpState::Copied | OpState::Verifying | OpState::Verified
        )
    }
}

impl Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpState::Pending => "pending",
            OpState::Renamed => "renamed",
            OpState::Copying => "copying",
            OpState::Copied => "copied",
            OpState::Verifying => "verifying",
            OpState::Verified => "verified",
            OpState::SourceQuarantined => "source-quarantined",
            OpState::Committed => "committed",
            OpState::Failed => "failed",
            OpState::RolledBack => "rolled-back",
        };
        write!(f, "{name}")
    }
}

/// Error taxonomy for structured move errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveErrorKind {
    /// Invalid roots, missing permissions on configured paths.
    Config,
    /// I/O that kept failing after retries.
    TransientIo,
    /// Mixed content, malformed sidecar data.
    Classification,
    /// Disk full, permission denied mid-copy, verification mismatch.
    Transaction,
    /// Internal invariant broken (e.g. colliding plans); unit skipped.
    Invariant,
    Cancelled,
}

/// A structured error attached to a unit or operation. Errors cross the
/// engine boundary as values, never as panics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MoveError {
    pub kind: MoveErrorKind,
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub message: String,
}

impl MoveError {
    pub fn new(kind: MoveErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: None,
            destination: None,
            message: message.into(),
        }
    }

    pub fn with_paths(
        mut self,
        source: Option<PathBuf>,
        destination: Option<PathBuf>,
    ) -> Self {
        self.source = source;
        self.destination = destination;
        self
    }
}

impl Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(src) = &self.source {
            write!(f, " (source: {})", src.display())?;
        }
        if let Some(dst) = &self.destination {
            write!(f, " (destination: {})", dst.display())?;
        }
        Ok(())
    }
}

/// Result of the validation pass run before any mutation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PreflightReport {
    pub free_space_ok: bool,
    pub perms_ok: bool,
    pub path_len_ok: bool,
    /// Destinations that already exist and need conflict resolution.
    pub conflicts: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl Default for PreflightReport {
    fn default() -> Self {
        Self {
            free_space_ok: true,
            perms_ok: true,
            path_len_ok: true,
            conflicts: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl PreflightReport {
    pub fn passed(&self) -> bool {
        self.free_space_ok && self.perms_ok && self.path_len_ok
    }
}

/// Terminal summary for one unit's transaction.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MoveResult {
    pub unit_root: PathBuf,
    pub moved: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub replaced: Vec<PathBuf>,
    pub kept_both: Vec<PathBuf>,
    /// In-flight work was reverted. Distinct from `partially_applied`:
    /// operations that had already committed stay committed.
    pub rolled_back: bool,
    /// Some operations committed before the transaction failed.
    pub partially_applied: bool,
    pub errors: Vec<MoveError>,
}

impl MoveResult {
    pub fn new(unit_root: impl Into<PathBuf>) -> Self {
        Self {
            unit_root: unit_root.into(),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty() && !self.rolled_back
    }

    pub fn files_placed(&self) -> usize {
        self.moved.len() + self.replaced.len() + self.kept_both.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_copy_states() {
        assert!(!OpState::Pending.has_uncommitted_copy());
        assert!(!OpState::Copying.has_uncommitted_copy());
        assert!(OpState::Copied.has_uncommitted_copy());
        assert!(OpState::Verified.has_uncommitted_copy());
        assert!(!OpState::Committed.has_uncommitted_copy());
    }

    #[test]
    fn move_error_serializes_with_snake_case_kind() {
        let err = MoveError::new(MoveErrorKind::TransientIo, "timed out");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("transient_io"));
    }
}
