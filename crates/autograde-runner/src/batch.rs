//! Batch grading with a bounded worker pool.
//!
//! Each request goes backend → reconciliation → record → store. Requests are
//! independent; concurrency only overlaps the backend and store I/O. A
//! failing task never aborts the batch, and the report lists outcomes in
//! request order regardless of completion order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use autograde_core::{ReconcileConfig, ReconciliationPipeline, ReconciliationResult};

use crate::artifact::{write_reconciliation_artifact, ReconciliationArtifact};
use crate::backend::{GradingRequest, ScoringBackend};
use crate::obs;
use crate::record::{GradingKey, GradingRecord};
use crate::store::GradeStore;

/// Batch tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum requests in flight at once (at least 1).
    pub max_concurrency: usize,
    /// Where to write per-record audit artifacts, if anywhere.
    pub artifacts_dir: Option<PathBuf>,
    pub pipeline: ReconcileConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            artifacts_dir: None,
            pipeline: ReconcileConfig::default(),
        }
    }
}

/// How a single request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Reconciled and stored (anomalies, if any, are in the sanity report).
    Graded,
    /// Backend call failed; an all-zero result explaining why was stored.
    BackendFailed,
    /// Reconciled, but the store rejected the record.
    StoreFailed,
}

/// Outcome of one request in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub index: usize,
    pub key: GradingKey,
    pub status: TaskStatus,
    pub record_id: Option<Uuid>,
    pub total: u64,
    pub total_possible: u64,
    pub anomalies: usize,
    pub error: Option<String>,
}

/// Summary of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    pub fn graded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == TaskStatus::Graded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.graded_count()
    }
}

/// Grades many answers concurrently against their rubrics.
pub struct BatchGrader {
    backend: Arc<dyn ScoringBackend>,
    store: Arc<dyn GradeStore>,
    pipeline: ReconciliationPipeline,
    config: BatchConfig,
}

impl BatchGrader {
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        store: Arc<dyn GradeStore>,
        config: BatchConfig,
    ) -> Self {
        Self {
            backend,
            store,
            pipeline: ReconciliationPipeline::new(config.pipeline.clone()),
            config,
        }
    }

    /// Run every request, at most `max_concurrency` at a time.
    pub async fn run(&self, requests: Vec<GradingRequest>) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let limit = self.config.max_concurrency.max(1);
        obs::emit_batch_started(batch_id, requests.len(), limit);

        let mut outcomes: Vec<TaskOutcome> = stream::iter(requests.iter().enumerate())
            .map(|(index, request)| {
                let span = tracing::info_span!("autograde.task", batch_id = %batch_id, key = %request.key);
                self.grade_one(index, request).instrument(span)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.index);

        let report = BatchReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        obs::emit_batch_finished(
            batch_id,
            report.graded_count(),
            report.failed_count(),
            start.elapsed().as_millis() as u64,
        );
        report
    }

    /// Grade a single request; `index` is its position in the batch.
    pub async fn grade_one(&self, index: usize, request: &GradingRequest) -> TaskOutcome {
        let (result, raw_response, mut status, mut error) =
            match self.backend.generate(request).await {
                Ok(raw) => (
                    self.pipeline.reconcile(&request.rubric, &raw),
                    Some(raw),
                    TaskStatus::Graded,
                    None,
                ),
                Err(e) => {
                    obs::emit_task_failed(&request.key, "generate", &e);
                    let reason = format!("{e:#}");
                    (
                        ReconciliationResult::failed(&request.rubric, self.pipeline.config(), &reason),
                        None,
                        TaskStatus::BackendFailed,
                        Some(reason),
                    )
                }
            };

        let total = result.total;
        let total_possible = request.rubric.total_possible();
        let anomalies = result.sanity.anomaly_count();
        let record = GradingRecord::new(
            request.key.clone(),
            self.backend.model_id(),
            request.rubric.clone(),
            result,
        )
        .with_submission(&request.student_answer, &request.language);

        let record_id = match self.store.upsert(record).await {
            Ok(stored) => {
                obs::emit_reconciled(&stored.key, total, total_possible, &stored.sanity);
                self.write_artifact(&stored, raw_response).await;
                Some(stored.id)
            }
            Err(e) => {
                obs::emit_task_failed(&request.key, "store", &e);
                status = TaskStatus::StoreFailed;
                error = Some(e.to_string());
                None
            }
        };

        TaskOutcome {
            index,
            key: request.key.clone(),
            status,
            record_id,
            total,
            total_possible,
            anomalies,
            error,
        }
    }

    /// Best-effort audit artifact; failures are logged, never fatal.
    async fn write_artifact(&self, record: &GradingRecord, raw_response: Option<String>) {
        let Some(dir) = self.config.artifacts_dir.clone() else {
            return;
        };
        let artifact = ReconciliationArtifact {
            record_id: record.id,
            key: record.key.clone(),
            model_id: record.model_id.clone(),
            rubric: record.rubric.clone(),
            raw_response,
            result: ReconciliationResult {
                aligned_scores: record.aligned_scores.clone(),
                total: record.new_score,
                feedback_text: record.new_feedback.clone(),
                sanity: record.sanity.clone(),
            },
            written_at: Utc::now(),
        };
        let key = record.key.clone();
        let written =
            tokio::task::spawn_blocking(move || write_reconciliation_artifact(&artifact, &dir))
                .await;
        match written {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => obs::emit_task_failed(&key, "artifact", &e),
            Err(e) => obs::emit_task_failed(&key, "artifact", &e),
        }
    }
}
