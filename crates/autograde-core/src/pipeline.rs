//! Reconciliation pipeline: raw generator text in, consistent result out.
//!
//! ```text
//! Received ──parse ok──▶ Parsed ──▶ Aligned ──▶ Composed ──▶ Done
//!     └────parse err──▶ Failed ──(all-zero scores)──▶ Composed ──▶ Done
//! ```
//!
//! Every path ends in `Done` with a complete result; only an unusable rubric
//! (rejected before the pipeline runs) is a hard error.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::align::{align_breakdown, total_of, zero_scores, AlignedScore};
use crate::allocate::allocate_proportionally;
use crate::clamp::{clamp, coerce};
use crate::error::{ParseFailure, ReconcileError, Result};
use crate::feedback::FeedbackComposer;
use crate::matcher::{CriterionMatcher, DEFAULT_FUZZY_CUTOFF};
use crate::response::{parse_response, RawResponse};
use crate::rubric::RubricSchema;
use crate::sanity::{AlignmentStrategy, SanityReport, SanityReporter};

/// Tunables shared by every call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Minimum similarity ratio for fuzzy criterion matches.
    pub fuzzy_cutoff: f64,
    /// Prepend the `Total: …` rubric header to the feedback text.
    pub include_header: bool,
    /// Spread a lone reported total across criteria when no breakdown exists.
    pub fallback_when_empty: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: DEFAULT_FUZZY_CUTOFF,
            include_header: true,
            fallback_when_empty: true,
        }
    }
}

impl ReconcileConfig {
    /// Copy with the cutoff forced into `[0, 1]`.
    pub fn validated(&self) -> Self {
        Self {
            fuzzy_cutoff: CriterionMatcher::new(self.fuzzy_cutoff).cutoff(),
            ..self.clone()
        }
    }

    pub fn with_fuzzy_cutoff(mut self, cutoff: f64) -> Self {
        self.fuzzy_cutoff = cutoff;
        self
    }

    pub fn with_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn with_fallback(mut self, fallback_when_empty: bool) -> Self {
        self.fallback_when_empty = fallback_when_empty;
        self
    }
}

/// Pipeline states; each reconciliation walks them in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Parsed,
    Failed,
    Aligned,
    Composed,
    Done,
}

/// Final, internally consistent grading result for one answer.
///
/// `total` always equals the sum of `aligned_scores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub aligned_scores: Vec<AlignedScore>,
    pub total: u64,
    pub feedback_text: String,
    pub sanity: SanityReport,
}

impl ReconciliationResult {
    /// Result for a response that never arrived (e.g. the generator call failed).
    pub fn failed(rubric: &RubricSchema, config: &ReconcileConfig, reason: &str) -> Self {
        let mut reporter = SanityReporter::new(AlignmentStrategy::Empty);
        reporter.schema_errors(rubric.schema_errors());
        if rubric.is_zero_capacity() {
            reporter.zero_capacity_rubric();
        }
        reporter.backend_failure(reason);
        let aligned_scores = zero_scores(rubric);
        let feedback_text = FeedbackComposer::new(config.include_header).compose(
            rubric,
            &aligned_scores,
            0,
            &format!("Grading failed: {reason}"),
        );
        Self {
            aligned_scores,
            total: 0,
            feedback_text,
            sanity: reporter.finish(0),
        }
    }

    /// Bare per-criterion scores, in rubric order.
    pub fn scores(&self) -> Vec<u32> {
        self.aligned_scores.iter().map(|a| a.score).collect()
    }

    /// Human override of one criterion's score.
    ///
    /// The value is clamped into the criterion's range and `total` is
    /// re-derived with [`total_of`]. Returns the score actually stored.
    pub fn override_score(
        &mut self,
        rubric: &RubricSchema,
        index: usize,
        score: i64,
    ) -> Result<u32> {
        let len = self.aligned_scores.len();
        let (criterion, aligned) = rubric
            .criteria()
            .get(index)
            .zip(self.aligned_scores.get_mut(index))
            .ok_or(ReconcileError::CriterionOutOfRange { index, len })?;
        aligned.score = clamp(score, criterion.max_points).score;
        let stored = aligned.score;
        self.total = total_of(&self.aligned_scores);
        Ok(stored)
    }
}

/// The canonical reconciliation engine.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationPipeline {
    config: ReconcileConfig,
    matcher: CriterionMatcher,
    composer: FeedbackComposer,
}

impl ReconciliationPipeline {
    pub fn new(config: ReconcileConfig) -> Self {
        let config = config.validated();
        Self {
            matcher: CriterionMatcher::new(config.fuzzy_cutoff),
            composer: FeedbackComposer::new(config.include_header),
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Parse the rubric JSON, then reconcile. Fails only on an unusable rubric.
    pub fn reconcile_json(&self, rubric_json: &str, raw: &str) -> Result<ReconciliationResult> {
        let rubric = RubricSchema::from_json(rubric_json)?;
        Ok(self.reconcile(&rubric, raw))
    }

    /// Reconcile raw generator text against `rubric`.
    pub fn reconcile(&self, rubric: &RubricSchema, raw: &str) -> ReconciliationResult {
        debug!(stage = ?Stage::Received, bytes = raw.len(), "reconcile");
        self.reconcile_parsed(rubric, parse_response(raw))
    }

    /// Reconcile an already-parsed response (or its parse failure).
    pub fn reconcile_parsed(
        &self,
        rubric: &RubricSchema,
        parsed: std::result::Result<RawResponse, ParseFailure>,
    ) -> ReconciliationResult {
        let mut reporter = SanityReporter::new(AlignmentStrategy::Breakdown);
        reporter.schema_errors(rubric.schema_errors());
        if rubric.is_zero_capacity() {
            warn!(
                criteria = rubric.len(),
                "rubric has zero total points; every score will be 0"
            );
            reporter.zero_capacity_rubric();
        }

        let (aligned_scores, body) = match parsed {
            Ok(response) => {
                debug!(stage = ?Stage::Parsed, entries = response.entries.len(), "reconcile");
                let aligned = self.align(rubric, &response, &mut reporter);
                debug!(stage = ?Stage::Aligned, "reconcile");
                (aligned, response.feedback)
            }
            Err(failure) => {
                debug!(stage = ?Stage::Failed, %failure, "reconcile");
                let body = format!(
                    "Grading failed: could not parse the scoring response ({failure})."
                );
                reporter.parse_failure(failure);
                (zero_scores(rubric), body)
            }
        };

        let total = total_of(&aligned_scores);
        let feedback_text = self.composer.compose(rubric, &aligned_scores, total, &body);
        debug!(stage = ?Stage::Composed, "reconcile");

        let sanity = reporter.finish(total);
        if sanity.is_clean() {
            debug!(stage = ?Stage::Done, total, "reconcile");
        } else {
            info!(
                stage = ?Stage::Done,
                total,
                strategy = ?sanity.strategy,
                anomalies = sanity.anomaly_count(),
                unknown = sanity.unknown_criteria.len(),
                over_allocated = sanity.over_allocated.len(),
                total_mismatch = sanity.total_mismatch(),
                "reconciled with anomalies"
            );
        }

        ReconciliationResult {
            aligned_scores,
            total,
            feedback_text,
            sanity,
        }
    }

    fn align(
        &self,
        rubric: &RubricSchema,
        response: &RawResponse,
        reporter: &mut SanityReporter,
    ) -> Vec<AlignedScore> {
        let reported_total = response.reported_total.as_ref().map(|raw| {
            let c = coerce(raw);
            if c.coerced {
                reporter.coerced();
            }
            reporter.reported_total(c.value);
            c.value
        });

        match reported_total {
            Some(total) if response.breakdown_is_empty() && self.config.fallback_when_empty => {
                reporter.set_strategy(AlignmentStrategy::ProportionalFallback);
                let allocation = allocate_proportionally(rubric, total);
                rubric
                    .criteria()
                    .iter()
                    .zip(allocation.scores)
                    .enumerate()
                    .map(|(criterion_index, (c, score))| AlignedScore {
                        criterion_index,
                        criteria: c.name.clone(),
                        score,
                    })
                    .collect()
            }
            _ => align_breakdown(rubric, &response.entries, &self.matcher, reporter),
        }
    }
}
