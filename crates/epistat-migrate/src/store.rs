//! Opening the configured store.

use epistat_store_sqlite::SqliteStore;

use crate::{
  error::{MigrationError, Result},
  settings::{DatabaseLocation, MigrateConfig},
  validate::validate_source,
};

/// Validate the configured source file, then open (creating if needed) the
/// configured database. A rejected file never touches the database.
pub async fn open_store(config: &MigrateConfig) -> Result<SqliteStore> {
  validate_source(&config.csv_file_path)?;

  let opened = match &config.database {
    DatabaseLocation::InMemory => SqliteStore::open_in_memory().await,
    DatabaseLocation::File(path) => SqliteStore::open(path).await,
  };
  let store = opened.map_err(|e| MigrationError::Open {
    location: config.database.to_string(),
    source:   Box::new(e),
  })?;

  tracing::debug!(database = %config.database, "store opened");
  Ok(store)
}
