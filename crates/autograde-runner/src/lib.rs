//! Autograde Runner
//!
//! Orchestration around the reconciliation core: a backend seam for the
//! text-generation model, bounded-concurrency batch grading, grading records
//! with human corrections, a grade-store seam and auditable artifacts.

pub mod artifact;
pub mod backend;
pub mod batch;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod record;
pub mod store;
pub mod telemetry;

pub use artifact::{
    content_digest, read_reconciliation_artifact, write_reconciliation_artifact,
    ReconciliationArtifact,
};
pub use backend::{GradingRequest, ScoringBackend};
pub use batch::{BatchConfig, BatchGrader, BatchReport, TaskOutcome, TaskStatus};
pub use error::{Result, RunnerError};
pub use fakes::{Scripted, ScriptedBackend};
pub use record::{Correction, CorrectionEntry, GradingKey, GradingRecord};
pub use store::{GradeStore, MemoryGradeStore};
pub use telemetry::init_tracing;
