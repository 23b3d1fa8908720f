//! Criterion label normalisation and fuzzy matching.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2·M / T`, where `M` is the
//! number of characters in matching blocks found by repeatedly taking the
//! longest common substring and recursing on both sides of it.

use serde::{Deserialize, Serialize};

/// Minimum similarity ratio for a fuzzy match to be accepted.
pub const DEFAULT_FUZZY_CUTOFF: f64 = 0.60;

/// Lowercase, collapse whitespace runs to a single space, trim.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ratcliff/Obershelp similarity over Unicode scalar values, in `[0, 1]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Longest common block in `a[alo..ahi]` x `b[blo..bhi]`.
///
/// Ties go to the block that ends earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // run[j - blo] = length of the common run ending at (i - 1, j - 1)
    let mut prev = vec![0usize; bhi - blo + 1];
    let mut curr = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let k = if a[i] == b[j] { prev[j - blo] + 1 } else { 0 };
            curr[j - blo + 1] = k;
            if k > best_len {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_len = k;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (best_i, best_j, best_len)
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![((0, a.len()), (0, b.len()))];
    while let Some(((alo, ahi), (blo, bhi))) = queue.pop() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            queue.push(((i + k, ahi), (j + k, bhi)));
        }
    }
    matched
}

/// Winning candidate of a fuzzy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    /// Position of the winner in the candidate sequence.
    pub index: usize,
    /// Similarity ratio; `1.0` for exact matches.
    pub ratio: f64,
}

/// Maps free-form labels onto a fixed set of normalised names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriterionMatcher {
    cutoff: f64,
}

impl Default for CriterionMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_CUTOFF)
    }
}

impl CriterionMatcher {
    /// Create a matcher; the cutoff is clamped into `[0, 1]`.
    pub fn new(cutoff: f64) -> Self {
        let cutoff = if cutoff.is_nan() {
            DEFAULT_FUZZY_CUTOFF
        } else {
            cutoff.clamp(0.0, 1.0)
        };
        Self { cutoff }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Find the candidate most similar to `query`.
    ///
    /// Both `query` and the candidates must already be normalised. An exact
    /// match wins outright. Otherwise the highest ratio at or above the
    /// cutoff wins, and equal ratios resolve to the earliest candidate.
    ///
    /// The ratio is not symmetric; each candidate is scored as
    /// `similarity_ratio(candidate, query)`, the same orientation difflib's
    /// `get_close_matches` uses.
    pub fn best_match<'a, I>(&self, query: &str, candidates: I) -> Option<FuzzyMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<FuzzyMatch> = None;
        for (index, candidate) in candidates.into_iter().enumerate() {
            if candidate == query {
                return Some(FuzzyMatch { index, ratio: 1.0 });
            }
            let ratio = similarity_ratio(candidate, query);
            if ratio < self.cutoff {
                continue;
            }
            // strict comparison keeps the earliest candidate on ties
            if best.map_or(true, |b| ratio > b.ratio) {
                best = Some(FuzzyMatch { index, ratio });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_case_and_whitespace() {
        assert_eq!(normalize_label("  Define\t  X \n"), "define x");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn ratio_matches_known_values() {
        assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        // "give example" vs "give an example": blocks "give " + "example" = 12
        let r = similarity_ratio("give example", "give an example");
        assert!((r - 24.0 / 27.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_depends_on_argument_order() {
        // leftmost-longest block "ab" first leaves only "d" to match
        assert!((similarity_ratio("abcbd", "bcabd") - 0.6).abs() < 1e-12);
        assert!((similarity_ratio("bcabd", "abcbd") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn candidate_is_scored_against_query() {
        let m = CriterionMatcher::new(0.7)
            .best_match("abcbd", ["bcabd"])
            .unwrap();
        assert_eq!(m.index, 0);
        assert!((m.ratio - 0.8).abs() < 1e-12);
    }

    #[test]
    fn typo_is_matched() {
        let m = CriterionMatcher::default()
            .best_match("correct syntx", ["correct syntax", "uses comments"])
            .unwrap();
        assert_eq!(m.index, 0);
        assert!(m.ratio > 0.9);
    }

    #[test]
    fn below_cutoff_is_no_match() {
        let m = CriterionMatcher::default().best_match("efficiency", ["define x", "give example"]);
        assert!(m.is_none());
    }

    #[test]
    fn ratio_ties_resolve_to_first_candidate() {
        // "ab" is equally similar to "ax" and "ay"
        let m = CriterionMatcher::new(0.4)
            .best_match("ab", ["ay", "ax"])
            .unwrap();
        assert_eq!(m.index, 0);
        let m = CriterionMatcher::new(0.4)
            .best_match("ab", ["ax", "ay"])
            .unwrap();
        assert_eq!(m.index, 0);
    }

    #[test]
    fn exact_match_short_circuits() {
        let m = CriterionMatcher::new(1.0)
            .best_match("define x", ["define y", "define x"])
            .unwrap();
        assert_eq!(m, FuzzyMatch { index: 1, ratio: 1.0 });
    }

    #[test]
    fn cutoff_is_clamped() {
        assert_eq!(CriterionMatcher::new(3.0).cutoff(), 1.0);
        assert_eq!(CriterionMatcher::new(-1.0).cutoff(), 0.0);
        assert_eq!(CriterionMatcher::new(f64::NAN).cutoff(), DEFAULT_FUZZY_CUTOFF);
    }
}
