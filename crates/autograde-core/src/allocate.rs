//! Proportional allocation of a single reported total across criteria.
//!
//! Used when the generator reports only a total. Each criterion receives its
//! point share of the total, rounded, and the rounding drift is then paid out
//! (or taken back) one point at a time in rubric order so the final sum is
//! exactly the clamped reported total.

use crate::clamp::round_half_up;
use crate::rubric::RubricSchema;

/// Per-criterion scores produced by proportional allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// One score per rubric criterion, in rubric order.
    pub scores: Vec<u32>,
    /// The total that was distributed: `clamp(reported, 0, total_possible)`.
    pub target: u64,
}

/// Distribute `reported_total` across `rubric` by point share.
///
/// A rubric with zero capacity yields all-zero scores and a zero target.
pub fn allocate_proportionally(rubric: &RubricSchema, reported_total: i64) -> Allocation {
    let total_possible = rubric.total_possible();
    let maxes: Vec<u32> = rubric.criteria().iter().map(|c| c.max_points).collect();
    if total_possible == 0 {
        return Allocation {
            scores: vec![0; maxes.len()],
            target: 0,
        };
    }

    let target = reported_total.clamp(0, total_possible as i64) as u64;
    let mut scores: Vec<u32> = maxes
        .iter()
        .map(|&max| {
            let share = target as f64 * f64::from(max) / total_possible as f64;
            round_half_up(share).clamp(0, i64::from(max)) as u32
        })
        .collect();

    let allocated: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    let mut drift = target as i64 - allocated as i64;
    correct_drift(&mut scores, &maxes, &mut drift);

    Allocation { scores, target }
}

/// Walk the criteria in order, wrapping, moving one point per step.
fn correct_drift(scores: &mut [u32], maxes: &[u32], drift: &mut i64) {
    while *drift != 0 {
        let mut moved = false;
        for (score, &max) in scores.iter_mut().zip(maxes) {
            if *drift > 0 && *score < max {
                *score += 1;
                *drift -= 1;
                moved = true;
            } else if *drift < 0 && *score > 0 {
                *score -= 1;
                *drift += 1;
                moved = true;
            }
            if *drift == 0 {
                return;
            }
        }
        // capacity exhausted; only reachable if target exceeded total_possible
        if !moved {
            return;
        }
    }
}
