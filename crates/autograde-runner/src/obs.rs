//! Structured tracing events for the grading lifecycle.
//!
//! Events are emitted at `info!` (failures at `warn!`) with an `event`
//! field so log pipelines can filter on it, e.g. `event=batch.finished`.

use tracing::{info, warn};
use uuid::Uuid;

use autograde_core::SanityReport;

use crate::record::GradingKey;

/// Emit event: a batch started.
pub fn emit_batch_started(batch_id: Uuid, tasks: usize, max_concurrency: usize) {
    info!(
        event = "batch.started",
        batch_id = %batch_id,
        tasks = tasks,
        max_concurrency = max_concurrency,
    );
}

/// Emit event: one answer reconciled and stored.
pub fn emit_reconciled(key: &GradingKey, total: u64, total_possible: u64, sanity: &SanityReport) {
    info!(
        event = "reconcile.completed",
        key = %key,
        total = total,
        total_possible = total_possible,
        strategy = ?sanity.strategy,
        anomalies = sanity.anomaly_count(),
    );
}

/// Emit event: a task could not be completed normally (warning level).
pub fn emit_task_failed(key: &GradingKey, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "batch.task_failed", key = %key, stage = stage, error = %error);
}

/// Emit event: batch finished.
pub fn emit_batch_finished(batch_id: Uuid, graded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        graded = graded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: a human correction was applied.
pub fn emit_record_corrected(record_id: Uuid, editor_id: &str, old_score: u64, new_score: u64) {
    info!(
        event = "record.corrected",
        record_id = %record_id,
        editor_id = %editor_id,
        old_score = old_score,
        new_score = new_score,
    );
}
