//! Error types for `epistat-migrate`.

use std::{io, path::PathBuf};

use epistat_core::dimension::Dimension;
use thiserror::Error;

/// A store error with its concrete type erased.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fatal migration failure. Row-level problems are
/// [`Diagnostic`](epistat_core::diagnostic::Diagnostic)s, never this.
#[derive(Debug, Error)]
pub enum MigrationError {
  #[error("cannot access {path:?}: {source}")]
  FileAccess {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open store at {location}: {source}")]
  Open {
    location: String,
    #[source]
    source:   BoxError,
  },

  #[error("source file rejected: {0}")]
  Validation(String),

  #[error("failed to read source: {0}")]
  Source(#[source] epistat_core::Error),

  #[error("ledger error: {0}")]
  Ledger(#[source] BoxError),

  #[error("failed to write {dimension} dimension: {source}")]
  DimensionWrite {
    dimension: Dimension,
    #[source]
    source:    BoxError,
  },

  #[error("batch {batch} failed: {source}")]
  BatchInsert {
    /// 1-based batch number.
    batch:  usize,
    #[source]
    source: BoxError,
  },

  #[error("failed to insert global stats: {0}")]
  GlobalInsert(#[source] BoxError),

  #[error("consistency check failed: {0}")]
  Consistency(String),
}

impl From<epistat_core::Error> for MigrationError {
  fn from(err: epistat_core::Error) -> Self {
    match err {
      epistat_core::Error::FileAccess { path, source } => Self::FileAccess { path, source },
      other => Self::Source(other),
    }
  }
}

pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// Failure to assemble a [`MigrateConfig`](crate::settings::MigrateConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration: {0}")]
  Source(#[from] config::ConfigError),

  #[error("missing required configuration: {}", .0.join(", "))]
  Missing(Vec<&'static str>),

  #[error("invalid value for {key}: {message}")]
  Invalid {
    key:     &'static str,
    message: String,
  },
}
