//! Text-generation backend seam.
//!
//! Invoking a model (local adapter, hosted API, ...) is outside this
//! workspace. A backend receives the grading request and returns the raw
//! response text, which the reconciliation pipeline treats as untrusted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use autograde_core::RubricSchema;

use crate::record::GradingKey;

/// Everything a backend needs to grade one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRequest {
    pub key: GradingKey,
    pub question_text: String,
    pub ideal_answer: Option<String>,
    pub student_answer: String,
    pub rubric: RubricSchema,
    pub language: String,
}

/// Produces raw scoring responses.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Identifier of the model behind this backend, stored on every record.
    fn model_id(&self) -> &str;

    /// Generate a raw response for `request`.
    async fn generate(&self, request: &GradingRequest) -> anyhow::Result<String>;
}
