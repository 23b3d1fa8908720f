//! Human-facing feedback: a deterministic rubric header plus de-duplicated
//! narrative text from the generator.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::align::AlignedScore;
use crate::rubric::RubricSchema;

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("valid non-word regex"))
}

/// Comparison key for a feedback line: lowercase, non-word runs collapsed.
fn dedupe_key(line: &str) -> String {
    non_word_re()
        .replace_all(&line.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Drop blank and repeated lines, keeping the first occurrence of each.
///
/// Lines are trimmed for output; repetition is judged on the normalised key
/// so `"Good job."` and `"good job!"` count as the same sentence.
pub fn dedupe_feedback(text: &str) -> String {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(dedupe_key(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Total: t/tp` followed by one `- name: score/max` line per criterion.
pub fn render_header(rubric: &RubricSchema, scores: &[AlignedScore], total: u64) -> String {
    let mut header = format!("Total: {}/{}", total, rubric.total_possible());
    for (criterion, aligned) in rubric.criteria().iter().zip(scores) {
        let _ = write!(
            header,
            "\n- {}: {}/{}",
            criterion.name, aligned.score, criterion.max_points
        );
    }
    header
}

/// Builds the final feedback text for one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackComposer {
    pub include_header: bool,
}

impl Default for FeedbackComposer {
    fn default() -> Self {
        Self {
            include_header: true,
        }
    }
}

impl FeedbackComposer {
    pub fn new(include_header: bool) -> Self {
        Self { include_header }
    }

    pub fn compose(
        &self,
        rubric: &RubricSchema,
        scores: &[AlignedScore],
        total: u64,
        body: &str,
    ) -> String {
        let body = dedupe_feedback(body);
        if !self.include_header {
            return body;
        }
        let header = render_header(rubric, scores, total);
        if body.is_empty() {
            header
        } else {
            format!("{header}\n\n{body}")
        }
    }
}
