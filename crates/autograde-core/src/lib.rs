//! Autograde Core Library
//!
//! Reconciles a model's free-form grading response with the authoritative
//! rubric. Given the same rubric and response the output is always the same,
//! and it always satisfies:
//!
//! - one aligned score per rubric criterion, in rubric order
//! - `0 <= score <= max_points` for every criterion
//! - `total == sum(scores)`; a total claimed by the model is advisory only
//!
//! Anomalies never abort reconciliation; they are collected in a
//! [`SanityReport`] for auditing.

pub mod align;
pub mod allocate;
pub mod clamp;
pub mod error;
pub mod feedback;
pub mod matcher;
pub mod pipeline;
pub mod response;
pub mod rubric;
pub mod sanity;

pub use align::{align_breakdown, total_of, zero_scores, AlignedScore};
pub use allocate::{allocate_proportionally, Allocation};
pub use clamp::{clamp, coerce, round_half_up, Clamped, Coerced, RawScore};
pub use error::{ParseFailure, ReconcileError, Result, SchemaError};
pub use feedback::{dedupe_feedback, render_header, FeedbackComposer};
pub use matcher::{
    normalize_label, similarity_ratio, CriterionMatcher, FuzzyMatch, DEFAULT_FUZZY_CUTOFF,
};
pub use pipeline::{ReconcileConfig, ReconciliationPipeline, ReconciliationResult, Stage};
pub use response::{
    extract_json_object, parse_response, strip_code_fences, RawResponse, RawScoreEntry,
};
pub use rubric::{RubricCriterion, RubricRecord, RubricSchema};
pub use sanity::{
    AlignmentStrategy, FuzzyMatchRecord, OverAllocation, SanityReport, SanityReporter,
};

/// Autograde version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
