//! Lenient numeric coercion.
//!
//! Missing, empty and `NaN` inputs become zero silently. A value that is
//! present but cannot be parsed also becomes zero, and is reported on the
//! [`SECURITY_TARGET`] log target: by the time values reach the loader they
//! should already have been validated, so an unparseable one means the input
//! deviates from the expected format. Coercion never fails.

use thiserror::Error;

/// Tracing target for anomaly events, kept apart from ordinary logs.
pub const SECURITY_TARGET: &str = "security";

/// A present value that is not a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a number: {0:?}")]
pub struct ConversionError(pub String);

/// An input to [`safe_int`] / [`safe_float`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
  Missing,
  Number(f64),
  Text(&'a str),
}

impl From<f64> for RawValue<'_> {
  fn from(v: f64) -> Self { Self::Number(v) }
}

impl From<Option<f64>> for RawValue<'_> {
  fn from(v: Option<f64>) -> Self { v.map_or(Self::Missing, Self::Number) }
}

impl<'a> From<&'a str> for RawValue<'a> {
  fn from(v: &'a str) -> Self { Self::Text(v) }
}

impl<'a> From<Option<&'a str>> for RawValue<'a> {
  fn from(v: Option<&'a str>) -> Self { v.map_or(Self::Missing, Self::Text) }
}

/// Parse a CSV cell into an optional number.
///
/// `Ok(None)` for empty cells and `NaN` spellings; `Err` for anything else
/// that does not parse as a float.
pub fn parse_measure(raw: &str) -> Result<Option<f64>, ConversionError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }
  match trimmed.parse::<f64>() {
    Ok(v) if v.is_nan() => Ok(None),
    Ok(v) => Ok(Some(v)),
    Err(_) => Err(ConversionError(trimmed.to_owned())),
  }
}

/// Emit an anomaly event for a value that could not be converted.
pub fn report_anomaly(context: &str, err: &ConversionError) {
  tracing::warn!(target: SECURITY_TARGET, %context, "SECURITY EVENT: {err}");
}

fn to_float(value: RawValue<'_>, context: &str) -> f64 {
  match value {
    RawValue::Missing => 0.0,
    RawValue::Number(v) if v.is_nan() => 0.0,
    RawValue::Number(v) => v,
    RawValue::Text(s) => match parse_measure(s) {
      Ok(v) => v.unwrap_or(0.0),
      Err(e) => {
        report_anomaly(context, &e);
        0.0
      }
    },
  }
}

/// Coerce to `f64`; see the module docs for the policy.
pub fn safe_float<'a>(value: impl Into<RawValue<'a>>) -> f64 {
  to_float(value.into(), "float conversion")
}

/// Coerce to `i64`, truncating toward zero; see the module docs for the
/// policy.
pub fn safe_int<'a>(value: impl Into<RawValue<'a>>) -> i64 {
  // `as` saturates on overflow and maps infinities to the bounds.
  to_float(value.into(), "int conversion").trunc() as i64
}
