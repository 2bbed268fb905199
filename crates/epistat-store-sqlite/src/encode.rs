//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use epistat_core::{
  ledger::{MigrationRecord, MigrationStatus},
  stat::{DailyStat, GlobalStat, Rates},
};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A ledger row as read from SQLite, before decoding.
pub struct RawMigration {
  pub filename:    String,
  pub checksum:    String,
  pub status:      String,
  pub migrated_at: String,
}

impl RawMigration {
  pub fn into_record(self) -> Result<MigrationRecord> {
    Ok(MigrationRecord {
      filename:    self.filename,
      checksum:    self.checksum,
      status:      self.status.parse::<MigrationStatus>()?,
      migrated_at: decode_dt(&self.migrated_at)?,
    })
  }
}

/// A `daily_stats` row as read from SQLite, before decoding.
pub struct RawDailyStat {
  pub id:           i64,
  pub country_id:   i64,
  pub virus_id:     i64,
  pub season_id:    Option<i64>,
  pub date:         String,
  pub new_cases:    i64,
  pub new_deaths:   i64,
  pub total_cases:  i64,
  pub total_deaths: i64,
  pub rates:        Rates,
}

impl RawDailyStat {
  pub fn into_stat(self) -> Result<DailyStat> {
    Ok(DailyStat {
      id:           self.id,
      country_id:   self.country_id,
      virus_id:     self.virus_id,
      season_id:    self.season_id,
      date:         decode_date(&self.date)?,
      new_cases:    self.new_cases,
      new_deaths:   self.new_deaths,
      total_cases:  self.total_cases,
      total_deaths: self.total_deaths,
      rates:        self.rates,
    })
  }
}

/// A `global_stats` row as read from SQLite, before decoding.
pub struct RawGlobalStat {
  pub id:                  i64,
  pub virus_id:            i64,
  pub date:                String,
  pub total_cases:         Option<i64>,
  pub total_deaths:        Option<i64>,
  pub mean_infection_rate: Option<f64>,
  pub mean_death_rate_pop: Option<f64>,
}

impl RawGlobalStat {
  pub fn into_stat(self) -> Result<GlobalStat> {
    Ok(GlobalStat {
      id:                  self.id,
      virus_id:            self.virus_id,
      date:                decode_date(&self.date)?,
      total_cases:         self.total_cases.unwrap_or(0),
      total_deaths:        self.total_deaths.unwrap_or(0),
      mean_infection_rate: self.mean_infection_rate,
      mean_death_rate_pop: self.mean_death_rate_pop,
    })
  }
}
