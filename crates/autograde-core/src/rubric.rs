//! Immutable, ordered grading rubric.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clamp::{coerce, RawScore};
use crate::error::{ReconcileError, Result, SchemaError};
use crate::matcher::{normalize_label, CriterionMatcher, FuzzyMatch};

/// One named, point-capped criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub max_points: u32,
}

/// Professor-authored rubric entry as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricRecord {
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub points: serde_json::Value,
}

/// Ordered rubric with a normalised-name lookup built once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RubricParts", into = "RubricParts")]
pub struct RubricSchema {
    criteria: Vec<RubricCriterion>,
    normalized: Vec<String>,
    lookup: HashMap<String, usize>,
    schema_errors: Vec<SchemaError>,
}

/// Serialized form of a [`RubricSchema`]; the lookup is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RubricParts {
    criteria: Vec<RubricCriterion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    schema_errors: Vec<SchemaError>,
}

impl TryFrom<RubricParts> for RubricSchema {
    type Error = ReconcileError;

    fn try_from(parts: RubricParts) -> Result<Self> {
        Self::build(parts.criteria, parts.schema_errors)
    }
}

impl From<RubricSchema> for RubricParts {
    fn from(schema: RubricSchema) -> Self {
        Self {
            criteria: schema.criteria,
            schema_errors: schema.schema_errors,
        }
    }
}

impl RubricSchema {
    /// Build from already-typed criteria.
    pub fn new(criteria: Vec<RubricCriterion>) -> Result<Self> {
        Self::build(criteria, Vec::new())
    }

    /// Build from wire records, coercing points to non-negative integers.
    ///
    /// Unusable points become 0 and are recorded as [`SchemaError`]s.
    pub fn from_records(records: &[RubricRecord]) -> Result<Self> {
        let mut schema_errors = Vec::new();
        let criteria = records
            .iter()
            .map(|r| {
                let max_points = match parse_points(&RawScore::from(&r.points)) {
                    None => {
                        schema_errors.push(SchemaError::UnparsablePoints {
                            criteria: r.criteria.clone(),
                            raw: r.points.to_string(),
                        });
                        0
                    }
                    Some(v) if v < 0 => {
                        schema_errors.push(SchemaError::NegativePoints {
                            criteria: r.criteria.clone(),
                            raw: r.points.to_string(),
                        });
                        0
                    }
                    Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
                };
                RubricCriterion {
                    name: r.criteria.clone(),
                    max_points,
                }
            })
            .collect();
        Self::build(criteria, schema_errors)
    }

    /// Parse a JSON list of `{criteria, points}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_array() {
            return Err(ReconcileError::RubricNotAList);
        }
        let records: Vec<RubricRecord> = serde_json::from_value(value)?;
        Self::from_records(&records)
    }

    fn build(criteria: Vec<RubricCriterion>, schema_errors: Vec<SchemaError>) -> Result<Self> {
        if criteria.is_empty() {
            return Err(ReconcileError::EmptyRubric);
        }
        let normalized: Vec<String> = criteria.iter().map(|c| normalize_label(&c.name)).collect();
        let mut lookup = HashMap::with_capacity(normalized.len());
        for (index, name) in normalized.iter().enumerate() {
            // duplicate names collapse to the last one seen
            lookup.insert(name.clone(), index);
        }
        Ok(Self {
            criteria,
            normalized,
            lookup,
            schema_errors,
        })
    }

    pub fn criteria(&self) -> &[RubricCriterion] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Always false; construction rejects empty rubrics.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Sum of all criteria's maximum points.
    pub fn total_possible(&self) -> u64 {
        self.criteria.iter().map(|c| u64::from(c.max_points)).sum()
    }

    /// True when no score above zero can ever be awarded.
    pub fn is_zero_capacity(&self) -> bool {
        self.total_possible() == 0
    }

    /// Normalised criterion names, in rubric order.
    pub fn normalized_names(&self) -> &[String] {
        &self.normalized
    }

    /// Exact lookup by already-normalised name.
    pub fn lookup(&self, normalized: &str) -> Option<usize> {
        self.lookup.get(normalized).copied()
    }

    /// Map a free-form label onto a criterion index.
    ///
    /// Exact normalised matches win; otherwise the fuzzy matcher decides,
    /// resolving ratio ties by rubric order.
    pub fn match_label(&self, label: &str, matcher: &CriterionMatcher) -> Option<FuzzyMatch> {
        let norm = normalize_label(label);
        if let Some(index) = self.lookup(&norm) {
            return Some(FuzzyMatch { index, ratio: 1.0 });
        }
        matcher.best_match(&norm, self.normalized.iter().map(String::as_str))
    }

    /// Recovered defects found while coercing points.
    pub fn schema_errors(&self) -> &[SchemaError] {
        &self.schema_errors
    }
}

/// Points as an integer, or `None` when the value is not numeric at all.
fn parse_points(raw: &RawScore) -> Option<i64> {
    match raw {
        RawScore::Null | RawScore::Unsupported(_) => None,
        RawScore::Text(s) if !s.trim().parse::<f64>().is_ok_and(f64::is_finite) => None,
        other => Some(coerce(other).value),
    }
}
