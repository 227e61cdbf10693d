use chrono::NaiveDate;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

/// How to handle a pre-existing file at a destination path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the existing file; drop only the conflicting source.
    #[default]
    Skip,
    /// Move the existing file aside (restorable until commit), then move in.
    Replace,
    /// Append ` (1)`, ` (2)`, ... until the name is free.
    KeepBoth,
}

impl Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Skip => write!(f, "skip"),
            ConflictPolicy::Replace => write!(f, "replace"),
            ConflictPolicy::KeepBoth => write!(f, "keep-both"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(ConflictPolicy::Skip),
            "replace" => Ok(ConflictPolicy::Replace),
            "keep-both" | "keep_both" | "keepboth" => Ok(ConflictPolicy::KeepBoth),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

/// The naming metadata a destination filename was built from, kept so
/// callers can display or audit the formatting that was applied.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NamingMeta {
    pub season: Option<u16>,
    pub episodes: Vec<u16>,
    pub part: Option<u8>,
    pub date: Option<NaiveDate>,
}

/// Planned move for one source file (primary or companion).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DestinationPlan {
    pub source: PathBuf,
    /// Absolute, sanitized target path.
    pub destination: PathBuf,
    pub naming: NamingMeta,
    pub policy: ConflictPolicy,
    pub dry_run: bool,
    /// Source path of the owning primary when this plan is for a companion.
    pub owner: Option<PathBuf>,
}

impl DestinationPlan {
    pub fn is_companion(&self) -> bool {
        self.owner.is_some()
    }
}
