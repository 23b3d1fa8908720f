//! Error taxonomy for rubric reconciliation.
//!
//! Only [`ReconcileError`] is ever returned as `Err`. [`SchemaError`] and
//! [`ParseFailure`] describe recoverable defects; they are collected into the
//! sanity report so the pipeline can always produce a complete result.

use serde::{Deserialize, Serialize};

/// Defect in a single rubric criterion, recovered by coercing its points to 0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    #[error("criterion '{criteria}' has unparsable points: {raw}")]
    UnparsablePoints { criteria: String, raw: String },

    #[error("criterion '{criteria}' has negative points: {raw}")]
    NegativePoints { criteria: String, raw: String },
}

/// Why a raw scoring response could not be turned into structured entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseFailure {
    #[error("response is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("invalid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Hard failures. These are configuration errors, never per-submission ones.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("rubric has no criteria")]
    EmptyRubric,

    #[error("invalid rubric JSON: {0}")]
    InvalidRubricJson(#[from] serde_json::Error),

    #[error("rubric JSON must be a list of {{criteria, points}} objects")]
    RubricNotAList,

    #[error("criterion index {index} out of range for rubric of {len} criteria")]
    CriterionOutOfRange { index: usize, len: usize },
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
