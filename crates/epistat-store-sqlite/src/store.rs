//! [`SqliteStore`]: the SQLite implementation of [`StatStore`].

use std::{collections::HashSet, path::Path};

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, Transaction};

use epistat_core::{
  diagnostic::DiagnosticKind,
  dimension::{CountrySeed, Dimension, DimensionMap, DEFAULT_SEASON_ID, DEFAULT_SEASON_NAME},
  ledger::{MigrationRecord, MigrationStatus},
  stat::{Country, DailyStat, GlobalStat, NewDailyStat, NewGlobalStat, Rates, TableCounts, Virus},
  store::{InsertOutcome, StatStore},
};

use crate::{
  encode::{encode_date, encode_dt, RawDailyStat, RawGlobalStat, RawMigration},
  schema::SCHEMA,
  Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An epistat store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the same connection thread.
#[derive(Clone, Debug)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Look up or create each name in one dimension table inside one
  /// transaction. Population is only written for countries.
  async fn resolve_dimension(
    &self,
    dimension: Dimension,
    seeds: Vec<CountrySeed>,
  ) -> Result<DimensionMap> {
    let map = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let map = resolve_in(&tx, dimension, seeds)?;
        tx.commit()?;
        Ok(map)
      })
      .await?;
    tracing::debug!(%dimension, resolved = map.len(), "dimension committed");
    Ok(map)
  }
}

fn table_for(dimension: Dimension) -> &'static str {
  match dimension {
    Dimension::Country => "countries",
    Dimension::Virus => "viruses",
    Dimension::Season => "seasons",
  }
}

fn resolve_in(
  tx: &Transaction<'_>,
  dimension: Dimension,
  seeds: Vec<CountrySeed>,
) -> rusqlite::Result<DimensionMap> {
  let table = table_for(dimension);
  let mut select = tx.prepare(&format!("SELECT id FROM {table} WHERE name = ?1"))?;
  let mut insert = match dimension {
    Dimension::Country => tx.prepare("INSERT INTO countries (name, population) VALUES (?1, ?2)")?,
    _ => tx.prepare(&format!("INSERT INTO {table} (name) VALUES (?1)"))?,
  };

  let mut map = DimensionMap::new();
  for seed in seeds {
    let existing: Option<i64> = select
      .query_row(rusqlite::params![seed.name], |r| r.get(0))
      .optional()?;

    let id = match existing {
      Some(id) => id,
      None => {
        let written = match dimension {
          Dimension::Country => {
            insert.execute(rusqlite::params![seed.name, seed.population])
          }
          _ => insert.execute(rusqlite::params![seed.name]),
        };
        if let Err(e) = written {
          tracing::error!(%dimension, value = %seed.name, error = %e, "failed to write dimension row");
          return Err(e);
        }
        tx.last_insert_rowid()
      }
    };
    map.insert(seed.name, id);
  }
  Ok(map)
}

fn name_seeds(names: Vec<String>) -> Vec<CountrySeed> {
  names
    .into_iter()
    .map(|name| CountrySeed { name, population: None })
    .collect()
}

fn read_rates(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Rates> {
  Ok(Rates {
    case_growth:              row.get(first)?,
    death_rate:               row.get(first + 1)?,
    infection_rate:           row.get(first + 2)?,
    death_rate_pop:           row.get(first + 3)?,
    infection_rate_vs_global: row.get(first + 4)?,
    death_rate_pop_vs_global: row.get(first + 5)?,
  })
}

// ─── StatStore impl ──────────────────────────────────────────────────────────

impl StatStore for SqliteStore {
  type Error = crate::Error;

  // ── Migration ledger ──────────────────────────────────────────────────────

  async fn migration(&self, filename: &str) -> Result<Option<MigrationRecord>> {
    let filename = filename.to_owned();

    let raw: Option<RawMigration> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT filename, checksum, status, migrated_at
             FROM migration_ledger WHERE filename = ?1",
            rusqlite::params![filename],
            |row| {
              Ok(RawMigration {
                filename:    row.get(0)?,
                checksum:    row.get(1)?,
                status:      row.get(2)?,
                migrated_at: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMigration::into_record).transpose()
  }

  async fn record_migration(
    &self,
    filename: &str,
    checksum: &str,
    status: MigrationStatus,
  ) -> Result<MigrationRecord> {
    let record = MigrationRecord {
      filename: filename.to_owned(),
      checksum: checksum.to_owned(),
      status,
      migrated_at: Utc::now(),
    };

    let filename_str = record.filename.clone();
    let checksum_str = record.checksum.clone();
    let status_str   = status.as_str();
    let at_str       = encode_dt(record.migrated_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM migration_ledger WHERE filename = ?1",
          rusqlite::params![filename_str],
        )?;
        tx.execute(
          "INSERT INTO migration_ledger (filename, checksum, status, migrated_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![filename_str, checksum_str, status_str, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(filename = %record.filename, %status, "migration recorded");
    Ok(record)
  }

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn resolve_countries(&self, seeds: Vec<CountrySeed>) -> Result<DimensionMap> {
    self.resolve_dimension(Dimension::Country, seeds).await
  }

  async fn resolve_viruses(&self, names: Vec<String>) -> Result<DimensionMap> {
    self.resolve_dimension(Dimension::Virus, name_seeds(names)).await
  }

  async fn resolve_seasons(&self, names: Vec<String>) -> Result<DimensionMap> {
    self.resolve_dimension(Dimension::Season, name_seeds(names)).await
  }

  async fn ensure_default_season(&self) -> Result<i64> {
    self
      .conn
      .call(|conn| {
        // Ignored when id 1 (or the name) is already taken; any row with
        // that id satisfies the foreign key.
        conn.execute(
          "INSERT OR IGNORE INTO seasons (id, name) VALUES (?1, ?2)",
          rusqlite::params![DEFAULT_SEASON_ID, DEFAULT_SEASON_NAME],
        )?;
        Ok(())
      })
      .await?;
    Ok(DEFAULT_SEASON_ID)
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn insert_daily_batch(&self, batch: Vec<NewDailyStat>) -> Result<InsertOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = InsertOutcome::default();
        {
          let mut exists = tx.prepare(
            "SELECT 1 FROM daily_stats
             WHERE country_id = ?1 AND virus_id = ?2 AND date = ?3",
          )?;

          let mut seen: HashSet<(i64, i64, NaiveDate)> = HashSet::new();
          let mut pending: Vec<NewDailyStat> = Vec::with_capacity(batch.len());
          for stat in batch {
            let key = (stat.country_id, stat.virus_id, stat.date);
            if !seen.insert(key) {
              outcome.diagnostics.push(
                DiagnosticKind::DuplicateKey,
                Some(stat.line),
                format!(
                  "country {} / virus {} / {} repeated in batch; first row kept",
                  stat.country_id, stat.virus_id, stat.date
                ),
              );
              continue;
            }
            let date_str = encode_date(stat.date);
            if exists.exists(rusqlite::params![stat.country_id, stat.virus_id, date_str])? {
              outcome.diagnostics.push(
                DiagnosticKind::AlreadyPresent,
                Some(stat.line),
                format!(
                  "daily stat for country {} / virus {} / {} already exists",
                  stat.country_id, stat.virus_id, stat.date
                ),
              );
              continue;
            }
            pending.push(stat);
          }

          let mut insert = tx.prepare(
            "INSERT INTO daily_stats (
               country_id, virus_id, season_id, date,
               new_cases, new_deaths, total_cases, total_deaths,
               case_growth, death_rate, infection_rate, death_rate_pop,
               infection_rate_vs_global, death_rate_pop_vs_global
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          )?;
          for stat in &pending {
            insert.execute(rusqlite::params![
              stat.country_id,
              stat.virus_id,
              stat.season_id,
              encode_date(stat.date),
              stat.new_cases,
              stat.new_deaths,
              stat.total_cases,
              stat.total_deaths,
              stat.rates.case_growth,
              stat.rates.death_rate,
              stat.rates.infection_rate,
              stat.rates.death_rate_pop,
              stat.rates.infection_rate_vs_global,
              stat.rates.death_rate_pop_vs_global,
            ])?;
          }
          outcome.inserted = pending.len();
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  async fn insert_global_stats(&self, rows: Vec<NewGlobalStat>) -> Result<InsertOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = InsertOutcome::default();
        {
          let mut exists =
            tx.prepare("SELECT 1 FROM global_stats WHERE virus_id = ?1 AND date = ?2")?;
          let mut insert = tx.prepare(
            "INSERT INTO global_stats (
               virus_id, date, total_cases, total_deaths,
               mean_infection_rate, mean_death_rate_pop
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;

          for stat in rows {
            let date_str = encode_date(stat.date);
            if exists.exists(rusqlite::params![stat.virus_id, date_str])? {
              outcome.diagnostics.push(
                DiagnosticKind::AlreadyPresent,
                None,
                format!("global stat for virus {} / {} already exists", stat.virus_id, stat.date),
              );
              continue;
            }
            insert.execute(rusqlite::params![
              stat.virus_id,
              date_str,
              stat.total_cases,
              stat.total_deaths,
              stat.mean_infection_rate,
              stat.mean_death_rate_pop,
            ])?;
            outcome.inserted += 1;
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn counts(&self) -> Result<TableCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let count = |table: &str| -> rusqlite::Result<u64> {
          let n: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
          Ok(n as u64)
        };
        Ok(TableCounts {
          countries:    count("countries")?,
          viruses:      count("viruses")?,
          seasons:      count("seasons")?,
          daily_stats:  count("daily_stats")?,
          global_stats: count("global_stats")?,
          migrations:   count("migration_ledger")?,
        })
      })
      .await?;
    Ok(counts)
  }

  async fn country_by_name(&self, name: &str) -> Result<Option<Country>> {
    let name = name.to_owned();
    let country = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, name, population FROM countries WHERE name = ?1",
            rusqlite::params![name],
            |row| {
              Ok(Country {
                id:         row.get(0)?,
                name:       row.get(1)?,
                population: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;
    Ok(country)
  }

  async fn virus_by_name(&self, name: &str) -> Result<Option<Virus>> {
    let name = name.to_owned();
    let virus = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, name FROM viruses WHERE name = ?1",
            rusqlite::params![name],
            |row| Ok(Virus { id: row.get(0)?, name: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;
    Ok(virus)
  }

  async fn daily_stat(
    &self,
    country_id: i64,
    virus_id: i64,
    date: NaiveDate,
  ) -> Result<Option<DailyStat>> {
    let date_str = encode_date(date);

    let raw: Option<RawDailyStat> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, country_id, virus_id, season_id, date,
                    new_cases, new_deaths, total_cases, total_deaths,
                    case_growth, death_rate, infection_rate, death_rate_pop,
                    infection_rate_vs_global, death_rate_pop_vs_global
             FROM daily_stats
             WHERE country_id = ?1 AND virus_id = ?2 AND date = ?3",
            rusqlite::params![country_id, virus_id, date_str],
            |row| {
              Ok(RawDailyStat {
                id:           row.get(0)?,
                country_id:   row.get(1)?,
                virus_id:     row.get(2)?,
                season_id:    row.get(3)?,
                date:         row.get(4)?,
                new_cases:    row.get(5)?,
                new_deaths:   row.get(6)?,
                total_cases:  row.get(7)?,
                total_deaths: row.get(8)?,
                rates:        read_rates(row, 9)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDailyStat::into_stat).transpose()
  }

  async fn global_stats_for_virus(&self, virus_id: i64) -> Result<Vec<GlobalStat>> {
    let raws: Vec<RawGlobalStat> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, virus_id, date, total_cases, total_deaths,
                  mean_infection_rate, mean_death_rate_pop
           FROM global_stats WHERE virus_id = ?1 ORDER BY date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![virus_id], |row| {
            Ok(RawGlobalStat {
              id:                  row.get(0)?,
              virus_id:            row.get(1)?,
              date:                row.get(2)?,
              total_cases:         row.get(3)?,
              total_deaths:        row.get(4)?,
              mean_infection_rate: row.get(5)?,
              mean_death_rate_pop: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGlobalStat::into_stat).collect()
  }
}
