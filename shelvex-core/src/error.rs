use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("preflight failed for {unit}: {reasons:?}")]
    Preflight { unit: PathBuf, reasons: Vec<String> },

    #[error("verification mismatch for {destination}: expected {expected} bytes, found {actual}")]
    VerifyMismatch {
        destination: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("plan collision: {destination} planned from both {first} and {second}")]
    PlanCollision {
        destination: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Transient errors are worth retrying with backoff; everything else
    /// fails the operation immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ResourceBusy
            ),
            _ => false,
        }
    }
}
