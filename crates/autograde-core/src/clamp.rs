//! Numeric coercion and range clamping for untrusted scores.

use serde::{Deserialize, Serialize};

/// A score value exactly as the generator reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawScore {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
    /// Booleans, arrays and objects, kept as their JSON rendering.
    Unsupported(String),
}

impl From<&serde_json::Value> for RawScore {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawScore::Null,
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawScore::Integer(i),
                None => RawScore::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => RawScore::Text(s.clone()),
            other => RawScore::Unsupported(other.to_string()),
        }
    }
}

/// Integer obtained from a [`RawScore`], plus whether a type change was needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced {
    pub value: i64,
    pub coerced: bool,
}

/// A score bounded into `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub score: u32,
    pub over_allocated: bool,
}

/// Round to the nearest integer, ties toward positive infinity.
///
/// Saturates at the `i64` bounds; callers must filter non-finite input.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Turn any raw value into an integer score.
///
/// Integers pass through untouched. Integral floats (`2.0`) are not flagged;
/// everything else that needed rounding, parsing or defaulting is.
pub fn coerce(raw: &RawScore) -> Coerced {
    match raw {
        RawScore::Integer(i) => Coerced {
            value: *i,
            coerced: false,
        },
        RawScore::Float(f) if f.is_finite() => Coerced {
            value: round_half_up(*f),
            coerced: f.fract() != 0.0,
        },
        RawScore::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Coerced {
                value: round_half_up(f),
                coerced: true,
            },
            _ => Coerced {
                value: 0,
                coerced: true,
            },
        },
        RawScore::Float(_) | RawScore::Null | RawScore::Unsupported(_) => Coerced {
            value: 0,
            coerced: true,
        },
    }
}

/// Bound `value` into `[0, max]`, noting whether it exceeded `max`.
pub fn clamp(value: i64, max: u32) -> Clamped {
    let over_allocated = value > i64::from(max);
    let score = value.clamp(0, i64::from(max)) as u32;
    Clamped {
        score,
        over_allocated,
    }
}
