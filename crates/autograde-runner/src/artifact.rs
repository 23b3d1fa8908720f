//! Auditable on-disk reconciliation artifacts.
//!
//! Each graded answer can be written as `<dir>/<record_id>/reconciliation.json`
//! with a SHA-256 digest alongside it, so a disputed grade can later be
//! replayed from the exact raw response the model produced.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use autograde_core::{ReconciliationResult, RubricSchema};

use crate::error::{Result, RunnerError};
use crate::record::GradingKey;

const ARTIFACT_FILE: &str = "reconciliation.json";
const DIGEST_FILE: &str = "reconciliation.digest";

/// Everything needed to re-run and audit one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationArtifact {
    pub record_id: Uuid,
    pub key: GradingKey,
    pub model_id: String,
    pub rubric: RubricSchema,
    /// Raw model output; `None` when the backend call itself failed.
    pub raw_response: Option<String>,
    pub result: ReconciliationResult,
    pub written_at: DateTime<Utc>,
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Persist the artifact and its digest; returns the JSON path.
pub fn write_reconciliation_artifact(
    artifact: &ReconciliationArtifact,
    dir: &Path,
) -> Result<PathBuf> {
    let record_dir = dir.join(artifact.record_id.to_string());
    std::fs::create_dir_all(&record_dir)?;

    let path = record_dir.join(ARTIFACT_FILE);
    let json = serde_json::to_vec_pretty(artifact)?;

    std::fs::write(&path, &json)?;
    std::fs::write(record_dir.join(DIGEST_FILE), content_digest(&json).as_bytes())?;

    Ok(path)
}

/// Read an artifact back, verifying its digest.
pub fn read_reconciliation_artifact(record_id: Uuid, dir: &Path) -> Result<ReconciliationArtifact> {
    let record_dir = dir.join(record_id.to_string());

    let json = std::fs::read(record_dir.join(ARTIFACT_FILE))?;
    let expected = std::fs::read_to_string(record_dir.join(DIGEST_FILE))?;
    let actual = content_digest(&json);
    if expected.trim() != actual {
        return Err(RunnerError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
