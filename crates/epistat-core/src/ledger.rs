//! Migration ledger records.
//!
//! The ledger holds one row per source filename describing the outcome of the
//! most recent migration attempt. Rows are replaced, never updated.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Error;

/// Outcome of a migration attempt as stored in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
  InProgress,
  Completed,
  Failed,
}

impl MigrationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::InProgress => "in_progress",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for MigrationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for MigrationStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "in_progress" => Ok(Self::InProgress),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

/// A persisted ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
  pub filename:    String,
  /// Lowercase hex digest of the file content.
  pub checksum:    String,
  pub status:      MigrationStatus,
  pub migrated_at: DateTime<Utc>,
}
