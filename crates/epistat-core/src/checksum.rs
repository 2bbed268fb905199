//! Checksum tracker.
//!
//! Fingerprints the source file and compares it against the ledger to decide
//! whether a migration run has any work to do. Deciding never mutates state.

use std::{
  fmt,
  fs::File,
  io::Read,
  path::{Path, PathBuf},
};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
  ledger::{MigrationRecord, MigrationStatus},
  Error, Result,
};

const CHUNK_SIZE: usize = 8 * 1024;

/// The file being migrated, fingerprinted for this run only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  pub path:     PathBuf,
  /// Basename; the ledger key.
  pub filename: String,
  pub checksum: String,
}

impl SourceFile {
  /// Fingerprint the file at `path`.
  pub fn fingerprint(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let checksum = file_checksum(path)?;
    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(Self { path: path.to_path_buf(), filename, checksum })
  }
}

/// SHA-256 of the file content as lowercase hex, read in fixed-size chunks.
pub fn file_checksum(path: &Path) -> Result<String> {
  let access = |source| Error::FileAccess { path: path.to_path_buf(), source };

  let mut file = File::open(path).map_err(access)?;
  let mut hasher = Sha256::new();
  let mut buf = vec![0u8; CHUNK_SIZE];
  loop {
    let n = file.read(&mut buf).map_err(access)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}

/// Why a migration is (or is not) going to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationReason {
  /// No ledger record exists for this filename.
  FirstMigration,
  /// Same checksum as the last completed run.
  Unchanged,
  /// Same checksum, but the force flag overrides the skip.
  Forced,
  /// Same checksum, but the last attempt did not complete.
  Retry(MigrationStatus),
  /// The file content differs from the last recorded run.
  Changed,
}

impl fmt::Display for MigrationReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::FirstMigration => f.write_str("first migration"),
      Self::Unchanged => f.write_str("file unchanged since last migration"),
      Self::Forced => f.write_str("forced migration"),
      Self::Retry(status) => {
        write!(f, "previous attempt ended with status {status}")
      }
      Self::Changed => f.write_str("file changed since last migration"),
    }
  }
}

/// Result of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationDecision {
  pub needed: bool,
  pub reason: MigrationReason,
}

/// Decide whether to migrate given the previous ledger record (if any) for
/// the same filename.
pub fn decide(
  previous: Option<&MigrationRecord>,
  checksum: &str,
  force: bool,
) -> MigrationDecision {
  let reason = match previous {
    None => MigrationReason::FirstMigration,
    Some(prev) if prev.checksum != checksum => MigrationReason::Changed,
    Some(prev) if prev.status != MigrationStatus::Completed => {
      MigrationReason::Retry(prev.status)
    }
    Some(_) if force => MigrationReason::Forced,
    Some(_) => MigrationReason::Unchanged,
  };
  MigrationDecision { needed: reason != MigrationReason::Unchanged, reason }
}
