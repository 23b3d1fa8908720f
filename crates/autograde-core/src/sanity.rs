//! Diagnostic record of every anomaly met while reconciling one response.
//!
//! A [`SanityReporter`] accumulates findings during a single reconciliation
//! and is frozen into a [`SanityReport`] when the pipeline finishes. Nothing
//! recorded here ever changes the returned scores.

use serde::{Deserialize, Serialize};

use crate::error::{ParseFailure, SchemaError};

/// How the aligned scores were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStrategy {
    /// Per-criterion breakdown matched onto the rubric.
    Breakdown,
    /// Single reported total spread across criteria by point share.
    ProportionalFallback,
    /// Response could not be parsed; every criterion scored 0.
    ParseFailed,
    /// Scoring never produced a response (e.g. generator call failed).
    Empty,
}

/// A raw score that exceeded its criterion's maximum before clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverAllocation {
    pub criteria: String,
    pub reported_score: i64,
    pub max: u32,
}

/// A criterion resolved through similarity rather than exact name equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatchRecord {
    pub criteria: String,
    pub matched_label: String,
    pub ratio: f64,
}

/// Frozen anomaly report returned alongside every reconciliation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanityReport {
    pub strategy: AlignmentStrategy,
    pub unknown_criteria: Vec<String>,
    pub over_allocated: Vec<OverAllocation>,
    pub coerced_types: bool,
    pub raw_entries_seen: usize,
    pub reported_total: Option<i64>,
    pub recomputed_total: u64,
    #[serde(default)]
    pub fuzzy_matches: Vec<FuzzyMatchRecord>,
    #[serde(default)]
    pub parse_failure: Option<ParseFailure>,
    #[serde(default)]
    pub schema_errors: Vec<SchemaError>,
    #[serde(default)]
    pub zero_capacity_rubric: bool,
    #[serde(default)]
    pub backend_failure: Option<String>,
}

impl SanityReport {
    /// True when the generator claimed a total that the recomputed sum contradicts.
    pub fn total_mismatch(&self) -> bool {
        self.reported_total
            .is_some_and(|reported| reported != self.recomputed_total as i64)
    }

    /// Number of distinct anomalies, for log summaries.
    pub fn anomaly_count(&self) -> usize {
        self.unknown_criteria.len()
            + self.over_allocated.len()
            + self.schema_errors.len()
            + usize::from(self.coerced_types)
            + usize::from(self.total_mismatch())
            + usize::from(self.parse_failure.is_some())
            + usize::from(self.zero_capacity_rubric)
            + usize::from(self.backend_failure.is_some())
    }

    /// True when nothing at all was out of the ordinary.
    pub fn is_clean(&self) -> bool {
        self.anomaly_count() == 0
    }
}

/// Mutable accumulator used while a reconciliation is in flight.
#[derive(Debug)]
pub struct SanityReporter {
    report: SanityReport,
}

impl SanityReporter {
    pub fn new(strategy: AlignmentStrategy) -> Self {
        Self {
            report: SanityReport {
                strategy,
                unknown_criteria: Vec::new(),
                over_allocated: Vec::new(),
                coerced_types: false,
                raw_entries_seen: 0,
                reported_total: None,
                recomputed_total: 0,
                fuzzy_matches: Vec::new(),
                parse_failure: None,
                schema_errors: Vec::new(),
                zero_capacity_rubric: false,
                backend_failure: None,
            },
        }
    }

    pub fn set_strategy(&mut self, strategy: AlignmentStrategy) {
        self.report.strategy = strategy;
    }

    pub fn unknown_criterion(&mut self, criteria: &str) {
        self.report.unknown_criteria.push(criteria.to_string());
    }

    pub fn over_allocated(&mut self, criteria: &str, reported_score: i64, max: u32) {
        self.report.over_allocated.push(OverAllocation {
            criteria: criteria.to_string(),
            reported_score,
            max,
        });
    }

    pub fn coerced(&mut self) {
        self.report.coerced_types = true;
    }

    pub fn entry_seen(&mut self) {
        self.report.raw_entries_seen += 1;
    }

    pub fn reported_total(&mut self, total: i64) {
        self.report.reported_total = Some(total);
    }

    pub fn fuzzy_match(&mut self, criteria: &str, matched_label: &str, ratio: f64) {
        self.report.fuzzy_matches.push(FuzzyMatchRecord {
            criteria: criteria.to_string(),
            matched_label: matched_label.to_string(),
            ratio,
        });
    }

    pub fn parse_failure(&mut self, failure: ParseFailure) {
        self.report.strategy = AlignmentStrategy::ParseFailed;
        self.report.parse_failure = Some(failure);
    }

    pub fn schema_errors(&mut self, errors: &[SchemaError]) {
        self.report.schema_errors.extend_from_slice(errors);
    }

    pub fn zero_capacity_rubric(&mut self) {
        self.report.zero_capacity_rubric = true;
    }

    pub fn backend_failure(&mut self, reason: impl Into<String>) {
        self.report.backend_failure = Some(reason.into());
    }

    /// Freeze the report with the authoritative recomputed total.
    pub fn finish(mut self, recomputed_total: u64) -> SanityReport {
        self.report.recomputed_total = recomputed_total;
        self.report
    }
}
