//! The migration orchestrator.
//!
//! Phases run one after another on a single store handle:
//!
//! 1. validate the file and fingerprint it;
//! 2. consult the ledger and decide whether to migrate;
//! 3. mark the run `in_progress`;
//! 4. read the source, resolve dimensions, load facts and global rows;
//! 5. verify the table counts;
//! 6. mark the run `completed`, or `failed` if any phase after 3 failed.
//!
//! Every phase commits its own transaction, so a failure leaves earlier
//! phases in place and only rolls back the one that was active.

use epistat_core::{
  aggregate::aggregate_facts,
  checksum::{decide, MigrationReason, SourceFile},
  diagnostic::Diagnostics,
  ledger::MigrationStatus,
  source::read_source_path,
  stat::TableCounts,
  store::StatStore,
};
use serde::Serialize;

use crate::{
  dimensions::resolve_dimensions,
  error::{MigrationError, Result},
  global::{load_global, GlobalSummary},
  loader::{load_facts, LoadSummary},
  settings::MigrateConfig,
  validate::validate_source,
  verify::verify,
};

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
  pub filename:    String,
  pub checksum:    String,
  pub reason:      MigrationReason,
  /// Records parsed from the file.
  pub source_rows: usize,
  pub facts:       LoadSummary,
  pub global:      GlobalSummary,
  pub counts:      TableCounts,
  pub diagnostics: Diagnostics,
}

/// Result of [`Migrator::run`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
  /// The file was already migrated and nothing was written.
  Skipped {
    filename: String,
    reason:   MigrationReason,
  },
  Completed(MigrationReport),
}

/// Runs one migration of the configured file into a store.
pub struct Migrator<'a, S> {
  config: &'a MigrateConfig,
  store:  S,
}

impl<'a, S: StatStore> Migrator<'a, S> {
  pub fn new(config: &'a MigrateConfig, store: S) -> Self { Self { config, store } }

  pub fn store(&self) -> &S { &self.store }

  /// Give the store back, e.g. to inspect it after a run.
  pub fn into_store(self) -> S { self.store }

  pub async fn run(&self) -> Result<MigrationOutcome> {
    let path = &self.config.csv_file_path;
    validate_source(path)?;
    let source = SourceFile::fingerprint(path)?;

    let previous = self
      .store
      .migration(&source.filename)
      .await
      .map_err(|e| MigrationError::Ledger(Box::new(e)))?;
    let decision = decide(previous.as_ref(), &source.checksum, self.config.force_migration);

    if !decision.needed {
      tracing::info!(filename = %source.filename, reason = %decision.reason, "migration skipped");
      return Ok(MigrationOutcome::Skipped {
        filename: source.filename,
        reason:   decision.reason,
      });
    }
    tracing::info!(
      filename = %source.filename,
      checksum = %source.checksum,
      reason = %decision.reason,
      "starting migration"
    );

    self.record(&source, MigrationStatus::InProgress).await?;

    let finished = match self.migrate(&source, decision.reason).await {
      Ok(report) => self
        .record(&source, MigrationStatus::Completed)
        .await
        .map(|()| report),
      Err(e) => Err(e),
    };

    match finished {
      Ok(report) => {
        tracing::info!(
          filename = %source.filename,
          inserted = report.facts.inserted,
          diagnostics = report.diagnostics.len(),
          "migration completed"
        );
        Ok(MigrationOutcome::Completed(report))
      }
      Err(e) => {
        tracing::error!(filename = %source.filename, error = %e, "migration failed");
        if let Err(ledger) = self.record(&source, MigrationStatus::Failed).await {
          tracing::error!(error = %ledger, "could not mark migration as failed");
        }
        Err(e)
      }
    }
  }

  async fn record(&self, source: &SourceFile, status: MigrationStatus) -> Result<()> {
    self
      .store
      .record_migration(&source.filename, &source.checksum, status)
      .await
      .map_err(|e| MigrationError::Ledger(Box::new(e)))?;
    Ok(())
  }

  async fn migrate(&self, source: &SourceFile, reason: MigrationReason) -> Result<MigrationReport> {
    let table = read_source_path(&source.path)?;
    tracing::info!(rows = table.rows.len(), has_season = table.has_season, "source parsed");
    let mut diagnostics = table.diagnostics.clone();

    let dims = resolve_dimensions(&self.store, &table).await?;

    let facts = aggregate_facts(&table.rows);
    tracing::debug!(source_rows = table.rows.len(), facts = facts.len(), "facts aggregated");
    let facts = load_facts(
      &self.store,
      &facts,
      &dims,
      self.config.batch_size,
      &mut diagnostics,
    )
    .await?;

    let global = load_global(&self.store, &table.rows, &dims.viruses, &mut diagnostics).await?;

    let counts = verify(&self.store).await?;

    Ok(MigrationReport {
      filename: source.filename.clone(),
      checksum: source.checksum.clone(),
      reason,
      source_rows: table.rows.len(),
      facts,
      global,
      counts,
      diagnostics,
    })
  }
}
