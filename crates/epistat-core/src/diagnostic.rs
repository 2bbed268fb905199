//! Row-level diagnostics.
//!
//! A diagnostic records a recoverable problem with one source record or one
//! aggregated row: the row is skipped (or a value coerced) and the pipeline
//! carries on. Diagnostics are logged and collected, never raised.

use std::fmt;

use serde::Serialize;

/// What went wrong with a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
  /// A numeric cell was present but not a number; it was treated as missing.
  Conversion,
  /// The CSV reader could not decode the record.
  MalformedRecord,
  /// A required value (country, virus, date) was empty.
  MissingValue,
  /// A country or virus had no surrogate id.
  UnresolvedDimension,
  /// The date was not a valid `YYYY-MM-DD` calendar date.
  InvalidDate,
  /// A row with the same unique key already exists in the database.
  AlreadyPresent,
  /// A row with the same unique key appeared earlier in the same batch.
  DuplicateKey,
}

impl DiagnosticKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Conversion => "conversion",
      Self::MalformedRecord => "malformed_record",
      Self::MissingValue => "missing_value",
      Self::UnresolvedDimension => "unresolved_dimension",
      Self::InvalidDate => "invalid_date",
      Self::AlreadyPresent => "already_present",
      Self::DuplicateKey => "duplicate_key",
    }
  }
}

impl fmt::Display for DiagnosticKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single recoverable problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub kind:    DiagnosticKind,
  /// 1-based source line (header is line 1), when the problem maps to one.
  pub line:    Option<usize>,
  pub message: String,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.line {
      Some(line) => write!(f, "[{}] line {line}: {}", self.kind, self.message),
      None => write!(f, "[{}] {}", self.kind, self.message),
    }
  }
}

/// An append-only collection of diagnostics for one migration run.
///
/// Each diagnostic is logged at `WARN` as it is pushed, so nothing recorded
/// here goes unreported even if the run later fails.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn new() -> Self { Self::default() }

  pub fn push(
    &mut self,
    kind: DiagnosticKind,
    line: Option<usize>,
    message: impl Into<String>,
  ) {
    let diagnostic = Diagnostic { kind, line, message: message.into() };
    tracing::warn!(kind = %diagnostic.kind, line = ?diagnostic.line, "{}", diagnostic.message);
    self.0.push(diagnostic);
  }

  pub fn extend(&mut self, other: Diagnostics) { self.0.extend(other.0); }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> { self.0.iter() }

  /// Number of diagnostics of the given kind.
  pub fn count(&self, kind: DiagnosticKind) -> usize {
    self.0.iter().filter(|d| d.kind == kind).count()
  }
}

impl IntoIterator for Diagnostics {
  type Item = Diagnostic;
  type IntoIter = std::vec::IntoIter<Diagnostic>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}
