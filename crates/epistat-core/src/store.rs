//! The `StatStore` trait.
//!
//! Implemented by storage backends (e.g. `epistat-store-sqlite`). The
//! migration pipeline depends on this abstraction, not on a concrete backend.
//!
//! Every write method runs in its own transaction and commits before it
//! returns; if it fails, nothing it wrote is kept. This is what lets the
//! pipeline commit phase by phase.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  diagnostic::Diagnostics,
  dimension::{CountrySeed, DimensionMap},
  ledger::{MigrationRecord, MigrationStatus},
  stat::{Country, DailyStat, GlobalStat, NewDailyStat, NewGlobalStat, TableCounts, Virus},
};

/// Result of a write that skips rows already present.
#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
  pub inserted:    usize,
  /// One entry per skipped row.
  pub diagnostics: Diagnostics,
}

/// Abstraction over the relational schema the loader writes into.
pub trait StatStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Migration ledger ──────────────────────────────────────────────────

  /// The current ledger record for `filename`, if any.
  fn migration(
    &self,
    filename: &str,
  ) -> impl Future<Output = Result<Option<MigrationRecord>, Self::Error>> + Send;

  /// Replace the ledger record for `filename` (delete, then insert) and
  /// commit immediately.
  fn record_migration(
    &self,
    filename: &str,
    checksum: &str,
    status: MigrationStatus,
  ) -> impl Future<Output = Result<MigrationRecord, Self::Error>> + Send;

  // ── Dimensions ────────────────────────────────────────────────────────

  /// Look up or create every country, in one transaction.
  ///
  /// Existing rows are reused untouched, including their population.
  fn resolve_countries(
    &self,
    seeds: Vec<CountrySeed>,
  ) -> impl Future<Output = Result<DimensionMap, Self::Error>> + Send;

  /// Look up or create every virus, in one transaction.
  fn resolve_viruses(
    &self,
    names: Vec<String>,
  ) -> impl Future<Output = Result<DimensionMap, Self::Error>> + Send;

  /// Look up or create every season, in one transaction.
  fn resolve_seasons(
    &self,
    names: Vec<String>,
  ) -> impl Future<Output = Result<DimensionMap, Self::Error>> + Send;

  /// Make sure a season row with the synthetic default id exists so facts
  /// can reference it. Returns that id.
  fn ensure_default_season(&self) -> impl Future<Output = Result<i64, Self::Error>> + Send;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Insert one batch of daily facts in a single transaction.
  ///
  /// Rows whose (country, virus, date) already exists, or repeats an earlier
  /// row of the same batch, are skipped and reported. Any insert failure
  /// rolls back the whole batch.
  fn insert_daily_batch(
    &self,
    batch: Vec<NewDailyStat>,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send;

  /// Insert global rows absent for their (virus, date), committing once.
  fn insert_global_stats(
    &self,
    rows: Vec<NewGlobalStat>,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Row counts for every table.
  fn counts(&self) -> impl Future<Output = Result<TableCounts, Self::Error>> + Send;

  fn country_by_name(
    &self,
    name: &str,
  ) -> impl Future<Output = Result<Option<Country>, Self::Error>> + Send;

  fn virus_by_name(
    &self,
    name: &str,
  ) -> impl Future<Output = Result<Option<Virus>, Self::Error>> + Send;

  fn daily_stat(
    &self,
    country_id: i64,
    virus_id: i64,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<DailyStat>, Self::Error>> + Send;

  /// All global rows for a virus, ordered by date.
  fn global_stats_for_virus(
    &self,
    virus_id: i64,
  ) -> impl Future<Output = Result<Vec<GlobalStat>, Self::Error>> + Send;
}
