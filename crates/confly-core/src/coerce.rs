//! Numeric coercion pass
//!
//! The last step of a build. Overrides and arithmetic results arrive as
//! text, so every string leaf that reads as a number becomes one: digit
//! strings become integers, float literals become integers when they have
//! no fractional part and floats otherwise. Everything else is untouched.

use crate::value::Value;

/// Upper bound (exclusive) of floats that convert to i64 without saturating
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Recursively coerce every numeric-looking string leaf
pub fn coerce_numeric(value: Value) -> Value {
    match value {
        Value::String(s) => coerce_str(&s).unwrap_or(Value::String(s)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(coerce_numeric).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, coerce_numeric(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Numeric reading of a single string, if it has one
///
/// Any float literal counts, including "inf", "-inf" and "nan".
pub fn coerce_str(s: &str) -> Option<Value> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(Value::Integer(i));
        }
    }

    let f: f64 = s.trim().parse().ok()?;
    Some(integral_or_float(f))
}

/// An integer when `f` has no fractional part and fits in i64
pub fn integral_or_float(f: f64) -> Value {
    if f.fract() == 0.0 && f >= -I64_UPPER && f < I64_UPPER {
        Value::Integer(f as i64)
    } else {
        Value::Float(f)
    }
}
