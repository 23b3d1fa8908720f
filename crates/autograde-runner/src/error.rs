//! Error taxonomy for grading orchestration.

use uuid::Uuid;

/// Errors produced around, never inside, reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("grading record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("correction has {got} scores but the rubric has {expected} criteria")]
    CorrectionLength { expected: usize, got: usize },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("reconcile error: {0}")]
    Reconcile(#[from] autograde_core::ReconcileError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
