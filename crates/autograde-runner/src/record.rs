//! Persistable grading records and human corrections.
//!
//! A record keeps the score and feedback the pipeline first produced
//! (`old_*`) next to the current, possibly human-edited values (`new_*`).
//! Every edit is re-derived with the same summation rule the pipeline uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autograde_core::{
    clamp, dedupe_feedback, total_of, AlignedScore, ReconciliationResult, RubricSchema,
    SanityReport,
};

use crate::error::{Result, RunnerError};

/// Natural key of one grading: one student's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GradingKey {
    pub student_id: String,
    pub assignment_no: String,
    pub question: String,
}

impl GradingKey {
    pub fn new(
        student_id: impl Into<String>,
        assignment_no: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            assignment_no: assignment_no.into(),
            question: question.into(),
        }
    }
}

impl std::fmt::Display for GradingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.student_id, self.assignment_no, self.question
        )
    }
}

/// Stored outcome of grading one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRecord {
    pub id: Uuid,
    pub key: GradingKey,
    pub model_id: String,
    pub rubric: RubricSchema,
    /// The graded submission, kept so a grade can be audited on its own.
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub language: String,
    pub aligned_scores: Vec<AlignedScore>,
    pub old_score: u64,
    pub new_score: u64,
    pub old_feedback: String,
    pub new_feedback: String,
    pub sanity: SanityReport,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GradingRecord {
    /// Fresh record from a reconciliation; old and new values start equal.
    pub fn new(
        key: GradingKey,
        model_id: impl Into<String>,
        rubric: RubricSchema,
        result: ReconciliationResult,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            model_id: model_id.into(),
            rubric,
            student_answer: String::new(),
            language: String::new(),
            aligned_scores: result.aligned_scores,
            old_score: result.total,
            new_score: result.total,
            old_feedback: result.feedback_text.clone(),
            new_feedback: result.feedback_text,
            sanity: result.sanity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the submission that was graded.
    pub fn with_submission(
        mut self,
        student_answer: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        self.student_answer = student_answer.into();
        self.language = language.into();
        self
    }

    pub fn total_possible(&self) -> u64 {
        self.rubric.total_possible()
    }

    /// Apply a human edit, returning the audit entry for it.
    ///
    /// Each override is clamped into its criterion's range and `new_score`
    /// is re-derived from the clamped scores, never taken from the editor.
    pub fn apply_correction(&mut self, correction: &Correction) -> Result<CorrectionEntry> {
        let expected = self.rubric.len();
        if correction.scores.len() != expected {
            return Err(RunnerError::CorrectionLength {
                expected,
                got: correction.scores.len(),
            });
        }

        for ((aligned, criterion), &score) in self
            .aligned_scores
            .iter_mut()
            .zip(self.rubric.criteria())
            .zip(&correction.scores)
        {
            aligned.score = clamp(score, criterion.max_points).score;
        }

        let entry = CorrectionEntry {
            record_id: self.id,
            old_score: self.new_score,
            new_score: total_of(&self.aligned_scores),
            old_feedback: self.new_feedback.clone(),
            new_feedback: dedupe_feedback(&correction.feedback),
            editor_id: correction.editor_id.clone(),
            at: Utc::now(),
        };

        self.new_score = entry.new_score;
        self.new_feedback = entry.new_feedback.clone();
        self.updated_at = entry.at;
        Ok(entry)
    }
}

/// A grader's edit: one score per criterion plus revised feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub scores: Vec<i64>,
    pub feedback: String,
    pub editor_id: String,
}

/// Audit trail entry for one applied correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub record_id: Uuid,
    pub old_score: u64,
    pub new_score: u64,
    pub old_feedback: String,
    pub new_feedback: String,
    pub editor_id: String,
    pub at: DateTime<Utc>,
}
