//! Consistency verifier: the gate between `completed` and `failed`.

use epistat_core::{stat::TableCounts, store::StatStore};

use crate::error::{MigrationError, Result};

/// Reject counts that mean the migration loaded nothing useful.
pub fn check_counts(counts: &TableCounts) -> Result<()> {
  if counts.daily_stats == 0 {
    return Err(MigrationError::Consistency("no daily stats were loaded".into()));
  }
  if counts.countries == 0 || counts.viruses == 0 {
    return Err(MigrationError::Consistency(format!(
      "reference data missing ({} countries, {} viruses)",
      counts.countries, counts.viruses
    )));
  }
  Ok(())
}

/// Count every table, log the summary and check it.
pub async fn verify<S: StatStore>(store: &S) -> Result<TableCounts> {
  let counts = store
    .counts()
    .await
    .map_err(|e| MigrationError::Consistency(format!("could not count rows: {e}")))?;

  tracing::info!(
    countries = counts.countries,
    viruses = counts.viruses,
    seasons = counts.seasons,
    daily_stats = counts.daily_stats,
    global_stats = counts.global_stats,
    migrations = counts.migrations,
    "migration summary"
  );

  if let Err(e) = check_counts(&counts) {
    tracing::error!(error = %e, "final verification failed");
    return Err(e);
  }
  tracing::info!("final verification passed");
  Ok(counts)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn counts(countries: u64, viruses: u64, daily_stats: u64) -> TableCounts {
    TableCounts { countries, viruses, daily_stats, ..TableCounts::default() }
  }

  #[test]
  fn populated_tables_pass() {
    check_counts(&counts(2, 1, 6)).unwrap();
  }

  #[test]
  fn empty_fact_table_fails() {
    assert!(matches!(check_counts(&counts(2, 1, 0)), Err(MigrationError::Consistency(_))));
  }

  #[test]
  fn missing_reference_data_fails() {
    assert!(check_counts(&counts(0, 1, 3)).is_err());
    assert!(check_counts(&counts(2, 0, 3)).is_err());
  }
}
