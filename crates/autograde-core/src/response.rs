//! Parse boundary between raw generator text and structured score entries.
//!
//! Generators wrap their JSON in code fences, prepend prose, or emit
//! something that is not JSON at all. Everything here is best-effort and
//! reports failure as a value, never as a panic.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::clamp::RawScore;
use crate::error::ParseFailure;
use crate::matcher::normalize_label;

/// One element of the generator's self-reported breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScoreEntry {
    pub criteria_label: String,
    pub raw_score: RawScore,
}

/// Structured view of a generator response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawResponse {
    pub entries: Vec<RawScoreEntry>,
    pub reported_total: Option<RawScore>,
    pub feedback: String,
}

impl RawResponse {
    /// True when no breakdown entry carries a usable criterion label.
    ///
    /// Entries whose label normalises to nothing cannot be aligned, so a
    /// breakdown made only of them counts as absent.
    pub fn breakdown_is_empty(&self) -> bool {
        self.entries
            .iter()
            .all(|e| normalize_label(&e.criteria_label).is_empty())
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```(?:json)?|```$").expect("valid fence regex"))
}

/// Remove Markdown code-fence markers.
pub fn strip_code_fences(raw: &str) -> String {
    fence_re().replace_all(raw.trim(), "").trim().to_string()
}

/// Byte ranges of every outermost balanced `{...}` span, left to right.
///
/// One forward pass with a stack of open braces, so an unclosed `{` does
/// not hide a balanced object after it. Braces inside JSON string literals
/// (including escaped quotes) are ignored; quotes outside any brace are not
/// string delimiters.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                let Some(start) = open.pop() else { continue };
                // an enclosing span supersedes the ones recorded inside it
                while spans.last().is_some_and(|&(s, _)| s > start) {
                    spans.pop();
                }
                spans.push((start, i + 1));
            }
            _ => {}
        }
    }
    spans
}

/// First balanced `{...}` span after fence stripping.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let cleaned = strip_code_fences(raw);
    balanced_spans(&cleaned)
        .first()
        .map(|&(s, e)| cleaned[s..e].to_string())
}

/// Parse a raw generator response into structured entries.
///
/// Balanced spans are tried in order, so prose such as `"{see below}"`
/// before the real payload does not hide it. The first span's error is
/// reported when none of them parses.
pub fn parse_response(raw: &str) -> Result<RawResponse, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    let cleaned = strip_code_fences(raw);
    let spans = balanced_spans(&cleaned);
    if spans.is_empty() {
        return Err(ParseFailure::NoJsonObject);
    }

    let mut first_failure = None;
    for (start, end) in spans {
        let parsed: serde_json::Result<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&cleaned[start..end]);
        match parsed {
            Ok(map) => return Ok(from_object(&map)),
            Err(e) => {
                first_failure.get_or_insert(ParseFailure::InvalidJson {
                    reason: e.to_string(),
                });
            }
        }
    }
    Err(first_failure.unwrap_or(ParseFailure::NoJsonObject))
}

fn from_object(map: &serde_json::Map<String, serde_json::Value>) -> RawResponse {
    let entries = match map.get("rubric_scores") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object())
            .map(|item| RawScoreEntry {
                criteria_label: item
                    .get("criteria")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string(),
                raw_score: item.get("score").map_or(RawScore::Null, RawScore::from),
            })
            .collect(),
        _ => Vec::new(),
    };

    let reported_total = match map.get("total_score") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(RawScore::from(v)),
    };

    let feedback = match map.get("feedback") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    RawResponse {
        entries,
        reported_total,
        feedback,
    }
}
