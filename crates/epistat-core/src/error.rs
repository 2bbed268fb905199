//! Error types for `epistat-core`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The source file could not be opened or read.
  #[error("cannot access {path:?}: {source}")]
  FileAccess {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("source is missing required column {0:?}")]
  MissingColumn(&'static str),

  #[error("unknown migration status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
