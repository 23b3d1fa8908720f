//! Alignment of a free-form score breakdown onto the rubric.
//!
//! The output always has exactly one [`AlignedScore`] per rubric criterion,
//! in rubric order, whatever the raw breakdown looked like.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clamp::{clamp, coerce};
use crate::matcher::{normalize_label, CriterionMatcher};
use crate::response::RawScoreEntry;
use crate::rubric::RubricSchema;
use crate::sanity::SanityReporter;

/// Trusted, bounded score for one rubric criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedScore {
    pub criterion_index: usize,
    pub criteria: String,
    pub score: u32,
}

/// The single summation rule for totals.
pub fn total_of(scores: &[AlignedScore]) -> u64 {
    scores.iter().map(|s| u64::from(s.score)).sum()
}

/// Normalised label → coerced score, with labels kept in first-seen order.
struct LabelScores {
    order: Vec<String>,
    scores: HashMap<String, i64>,
}

impl LabelScores {
    fn collect(entries: &[RawScoreEntry], reporter: &mut SanityReporter) -> Self {
        let mut order = Vec::new();
        let mut scores = HashMap::new();
        for entry in entries {
            let label = normalize_label(&entry.criteria_label);
            if label.is_empty() {
                continue;
            }
            let c = coerce(&entry.raw_score);
            if c.coerced {
                reporter.coerced();
            }
            reporter.entry_seen();
            // repeated labels keep their first position but the last value
            if scores.insert(label.clone(), c.value).is_none() {
                order.push(label);
            }
        }
        Self { order, scores }
    }
}

/// Map raw entries onto `rubric`, clamping and recording anomalies.
pub fn align_breakdown(
    rubric: &RubricSchema,
    entries: &[RawScoreEntry],
    matcher: &CriterionMatcher,
    reporter: &mut SanityReporter,
) -> Vec<AlignedScore> {
    let labels = LabelScores::collect(entries, reporter);

    rubric
        .criteria()
        .iter()
        .zip(rubric.normalized_names())
        .enumerate()
        .map(|(criterion_index, (criterion, norm))| {
            let resolved = match labels.scores.get(norm) {
                Some(&value) => Some(value),
                None => matcher
                    .best_match(norm, labels.order.iter().map(String::as_str))
                    .map(|m| {
                        let label = &labels.order[m.index];
                        reporter.fuzzy_match(&criterion.name, label, m.ratio);
                        labels.scores[label]
                    }),
            };

            let score = match resolved {
                Some(value) => {
                    let clamped = clamp(value, criterion.max_points);
                    if clamped.over_allocated {
                        reporter.over_allocated(&criterion.name, value, criterion.max_points);
                    }
                    clamped.score
                }
                None => {
                    reporter.unknown_criterion(&criterion.name);
                    0
                }
            };

            AlignedScore {
                criterion_index,
                criteria: criterion.name.clone(),
                score,
            }
        })
        .collect()
}

/// All-zero scores, one per criterion.
pub fn zero_scores(rubric: &RubricSchema) -> Vec<AlignedScore> {
    rubric
        .criteria()
        .iter()
        .enumerate()
        .map(|(criterion_index, c)| AlignedScore {
            criterion_index,
            criteria: c.name.clone(),
            score: 0,
        })
        .collect()
}
