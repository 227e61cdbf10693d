//! # Shelvex Core
//!
//! Engine for the Shelvex media organizer. The pipeline runs strictly
//! left to right:
//!
//! ```text
//! Grouper -> Identifier -> Scorer -> Planner -> Mover
//! ```
//!
//! Only the Mover mutates the filesystem, and it does so as per-unit
//! transactions with preflight, conflict resolution, rollback, and
//! companion propagation. Everything upstream is deterministic over the
//! scanned records and the injected rule sets.
//!
//! The [`engine::Engine`] facade is the intended entry point:
//! [`engine::Engine::plan`] produces reviewable unit views and
//! [`engine::Engine::execute`] applies the selected ones, streaming
//! progress and honoring cooperative cancellation.

/// Engine facade: plan / execute / cancel
pub mod engine;

/// Error types shared across the engine
pub mod error;

/// Grouping of scanned records into media units
pub mod grouper;

/// Signal extraction, sidecar parsing, and classification
pub mod identifier;

/// Transactional move execution
pub mod mover;

/// Destination-path planning and sanitization
pub mod planner;

/// Online metadata provider seam
pub mod providers;

/// Reference filesystem scanner (CLI and tests)
pub mod scanner;

/// Confidence scoring
pub mod scorer;

pub use engine::{Engine, EngineConfig, FilePlanView, MediaUnitView};
pub use error::{EngineError, Result};
pub use grouper::GroupingRules;
pub use identifier::Identifier;
pub use identifier::title::TitleRules;
pub use mover::{
    MoveHandle, MoveProgress, Mover, MoverConfig, RetryConfig, UnitPlans,
};
pub use planner::Planner;
pub use planner::sanitize::NamingRules;
pub use providers::{BestMatch, MatchQuery, MetadataProvider, ProviderError, ProviderManager};
pub use scanner::{ScanOutcome, Scanner};
pub use scorer::score_unit;
