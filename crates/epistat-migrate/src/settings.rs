//! Runtime configuration.
//!
//! Sources, lowest priority first: an optional TOML file, `EPISTAT_*`
//! environment variables, then command-line overrides. The resulting
//! [`MigrateConfig`] is built once at startup and passed by reference.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Prefix for environment variables, e.g. `EPISTAT_DATABASE_URL`.
pub const ENV_PREFIX: &str = "EPISTAT";

// ─── Database location ───────────────────────────────────────────────────────

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
  InMemory,
  File(PathBuf),
}

impl DatabaseLocation {
  /// Accepts `sqlite://path`, `sqlite:path`, a plain path, or `:memory:`.
  pub fn parse(url: &str) -> Result<Self, ConfigError> {
    let url = url.trim();
    let rest = url
      .strip_prefix("sqlite://")
      .or_else(|| url.strip_prefix("sqlite:"))
      .unwrap_or(url);

    if rest.is_empty() {
      return Err(ConfigError::Invalid {
        key:     "database_url",
        message: "empty database path".into(),
      });
    }
    if rest.contains("://") {
      return Err(ConfigError::Invalid {
        key:     "database_url",
        message: format!("unsupported database url {url:?}; only sqlite is supported"),
      });
    }
    if rest == ":memory:" {
      return Ok(Self::InMemory);
    }
    Ok(Self::File(PathBuf::from(rest)))
  }
}

impl std::fmt::Display for DatabaseLocation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::InMemory => f.write_str("sqlite::memory:"),
      Self::File(path) => write!(f, "sqlite://{}", path.display()),
    }
  }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Everything one migration run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
  pub database:        DatabaseLocation,
  pub csv_file_path:   PathBuf,
  /// Migrate even when the file is unchanged since the last completed run.
  pub force_migration: bool,
  pub batch_size:      usize,
}

impl MigrateConfig {
  pub fn new(database: DatabaseLocation, csv_file_path: impl Into<PathBuf>) -> Self {
    Self {
      database,
      csv_file_path: csv_file_path.into(),
      force_migration: false,
      batch_size: DEFAULT_BATCH_SIZE,
    }
  }

  pub fn with_force(mut self, force: bool) -> Self {
    self.force_migration = force;
    self
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  /// Build the configuration from `file` (if it exists), the environment and
  /// `overrides`.
  pub fn load(file: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
    let batch_size = overrides
      .batch_size
      .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

    let settings = Config::builder()
      .add_source(File::from(file).required(false))
      .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .set_override_option("database_url", overrides.database_url.clone())?
      .set_override_option(
        "csv_file_path",
        overrides
          .csv_file_path
          .as_ref()
          .map(|p| p.to_string_lossy().into_owned()),
      )?
      .set_override_option("force_migration", overrides.force_migration)?
      .set_override_option("batch_size", batch_size)?
      .build()?;

    settings.try_deserialize::<RawConfig>()?.into_config()
  }
}

/// Values supplied on the command line. `None` leaves lower-priority sources
/// in effect.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub database_url:    Option<String>,
  pub csv_file_path:   Option<PathBuf>,
  pub force_migration: Option<bool>,
  pub batch_size:      Option<usize>,
}

// ─── Raw deserialisation ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
  database_url:    Option<String>,
  csv_file_path:   Option<String>,
  force_migration: Option<Flag>,
  batch_size:      Option<i64>,
}

/// A boolean as it may arrive from TOML or the environment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
  Bool(bool),
  Int(i64),
  Text(String),
}

impl Flag {
  fn into_bool(self) -> Result<bool, ConfigError> {
    match self {
      Self::Bool(b) => Ok(b),
      Self::Int(n) => Ok(n != 0),
      Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
          key:     "force_migration",
          message: format!("expected a boolean, got {s:?}"),
        }),
      },
    }
  }
}

impl RawConfig {
  fn into_config(self) -> Result<MigrateConfig, ConfigError> {
    let database_url = self.database_url.filter(|s| !s.trim().is_empty());
    let csv_file_path = self.csv_file_path.filter(|s| !s.trim().is_empty());

    let mut missing = Vec::new();
    if database_url.is_none() {
      missing.push("database_url");
    }
    if csv_file_path.is_none() {
      missing.push("csv_file_path");
    }
    let (Some(database_url), Some(csv_file_path)) = (database_url, csv_file_path) else {
      return Err(ConfigError::Missing(missing));
    };

    let batch_size = match self.batch_size {
      None => DEFAULT_BATCH_SIZE,
      Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
      Some(n) => {
        return Err(ConfigError::Invalid {
          key:     "batch_size",
          message: format!("must be positive, got {n}"),
        });
      }
    };

    Ok(MigrateConfig {
      database: DatabaseLocation::parse(&database_url)?,
      csv_file_path: PathBuf::from(csv_file_path),
      force_migration: self.force_migration.map(Flag::into_bool).transpose()?.unwrap_or(false),
      batch_size,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn database_url_forms() {
    assert_eq!(
      DatabaseLocation::parse("sqlite://data/epi.db").unwrap(),
      DatabaseLocation::File("data/epi.db".into())
    );
    assert_eq!(
      DatabaseLocation::parse("sqlite:///tmp/epi.db").unwrap(),
      DatabaseLocation::File("/tmp/epi.db".into())
    );
    assert_eq!(
      DatabaseLocation::parse("epi.db").unwrap(),
      DatabaseLocation::File("epi.db".into())
    );
    assert_eq!(DatabaseLocation::parse(":memory:").unwrap(), DatabaseLocation::InMemory);
    assert_eq!(DatabaseLocation::parse("sqlite::memory:").unwrap(), DatabaseLocation::InMemory);
  }

  #[test]
  fn foreign_database_schemes_are_rejected() {
    let err = DatabaseLocation::parse("postgresql://localhost/epi").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "database_url", .. }));
  }

  #[test]
  fn missing_fields_are_reported_together() {
    let err = RawConfig::default().into_config().unwrap_err();
    match err {
      ConfigError::Missing(fields) => {
        assert_eq!(fields, vec!["database_url", "csv_file_path"]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn flag_spellings() {
    assert!(Flag::Text("yes".into()).into_bool().unwrap());
    assert!(Flag::Text("TRUE".into()).into_bool().unwrap());
    assert!(Flag::Int(1).into_bool().unwrap());
    assert!(!Flag::Text("no".into()).into_bool().unwrap());
    assert!(Flag::Text("maybe".into()).into_bool().is_err());
  }

  #[test]
  fn non_positive_batch_size_is_invalid() {
    let raw = RawConfig {
      database_url: Some(":memory:".into()),
      csv_file_path: Some("a.csv".into()),
      batch_size: Some(0),
      ..RawConfig::default()
    };
    assert!(matches!(
      raw.into_config(),
      Err(ConfigError::Invalid { key: "batch_size", .. })
    ));
  }

  #[test]
  fn loads_toml_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("epistat.toml");
    std::fs::write(
      &path,
      "database_url = \"sqlite://epi.db\"\ncsv_file_path = \"from-file.csv\"\nbatch_size = 50\n",
    )
    .unwrap();

    let overrides = Overrides {
      csv_file_path: Some("from-cli.csv".into()),
      force_migration: Some(true),
      ..Overrides::default()
    };
    let cfg = MigrateConfig::load(&path, &overrides).unwrap();
    assert_eq!(cfg.database, DatabaseLocation::File("epi.db".into()));
    assert_eq!(cfg.csv_file_path, PathBuf::from("from-cli.csv"));
    assert_eq!(cfg.batch_size, 50);
    assert!(cfg.force_migration);
  }

  #[test]
  fn absent_config_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let overrides = Overrides {
      database_url: Some(":memory:".into()),
      csv_file_path: Some("a.csv".into()),
      ..Overrides::default()
    };
    let cfg = MigrateConfig::load(&dir.path().join("nope.toml"), &overrides).unwrap();
    assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
    assert!(!cfg.force_migration);
  }
}
