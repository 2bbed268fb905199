//! Source file checks performed before any database work.

use std::{fs, io, path::Path};

use epistat_core::coerce::SECURITY_TARGET;

use crate::error::{MigrationError, Result};

/// File extensions accepted as source snapshots, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv"];

/// The file must exist as a regular file and carry an allowed extension.
pub fn validate_source(path: &Path) -> Result<()> {
  let meta = fs::metadata(path)
    .map_err(|source| MigrationError::FileAccess { path: path.to_path_buf(), source })?;
  if !meta.is_file() {
    return Err(MigrationError::FileAccess {
      path:   path.to_path_buf(),
      source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
    });
  }

  let extension = path
    .extension()
    .map(|e| e.to_string_lossy().to_ascii_lowercase())
    .unwrap_or_default();
  if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
    tracing::warn!(
      target: SECURITY_TARGET,
      path = %path.display(),
      %extension,
      "SECURITY EVENT: rejected source file with unexpected extension"
    );
    return Err(MigrationError::Validation(format!(
      "{} does not have an allowed extension ({})",
      path.display(),
      ALLOWED_EXTENSIONS.join(", ")
    )));
  }

  tracing::debug!(path = %path.display(), size = meta.len(), "source file validated");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_csv_in_any_case() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.csv", "b.CSV", "c.Csv"] {
      let path = dir.path().join(name);
      fs::write(&path, "country,virus,date\n").unwrap();
      validate_source(&path).unwrap();
    }
  }

  #[test]
  fn rejects_other_extensions() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["data.txt", "data", "data.csv.exe"] {
      let path = dir.path().join(name);
      fs::write(&path, "x").unwrap();
      assert!(matches!(validate_source(&path), Err(MigrationError::Validation(_))));
    }
  }

  #[test]
  fn missing_file_is_file_access() {
    let dir = tempfile::tempdir().unwrap();
    let err = validate_source(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, MigrationError::FileAccess { .. }));
  }

  #[test]
  fn directory_is_file_access() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("snap.csv");
    fs::create_dir(&sub).unwrap();
    assert!(matches!(validate_source(&sub), Err(MigrationError::FileAccess { .. })));
  }
}
