//! Fact and dimension rows as written to and read from the store.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Country {
  pub id:         i64,
  pub name:       String,
  pub population: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Virus {
  pub id:   i64,
  pub name: String,
}

/// The six derived rate/ratio columns of a daily fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
  pub case_growth:              Option<f64>,
  pub death_rate:               Option<f64>,
  pub infection_rate:           Option<f64>,
  pub death_rate_pop:           Option<f64>,
  pub infection_rate_vs_global: Option<f64>,
  pub death_rate_pop_vs_global: Option<f64>,
}

/// A daily fact ready for insertion, with all keys resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDailyStat {
  /// Source line of the first record in the aggregated group.
  pub line:         usize,
  pub country_id:   i64,
  pub virus_id:     i64,
  pub season_id:    Option<i64>,
  pub date:         NaiveDate,
  pub new_cases:    i64,
  pub new_deaths:   i64,
  pub total_cases:  i64,
  pub total_deaths: i64,
  pub rates:        Rates,
}

/// A persisted daily fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
  pub id:           i64,
  pub country_id:   i64,
  pub virus_id:     i64,
  pub season_id:    Option<i64>,
  pub date:         NaiveDate,
  pub new_cases:    i64,
  pub new_deaths:   i64,
  pub total_cases:  i64,
  pub total_deaths: i64,
  pub rates:        Rates,
}

/// A global (all countries) daily row ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGlobalStat {
  pub virus_id:            i64,
  pub date:                NaiveDate,
  pub total_cases:         i64,
  pub total_deaths:        i64,
  pub mean_infection_rate: Option<f64>,
  pub mean_death_rate_pop: Option<f64>,
}

/// A persisted global row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStat {
  pub id:                  i64,
  pub virus_id:            i64,
  pub date:                NaiveDate,
  pub total_cases:         i64,
  pub total_deaths:        i64,
  pub mean_infection_rate: Option<f64>,
  pub mean_death_rate_pop: Option<f64>,
}

/// Row counts for every table, as reported by the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
  pub countries:    u64,
  pub viruses:      u64,
  pub seasons:      u64,
  pub daily_stats:  u64,
  pub global_stats: u64,
  pub migrations:   u64,
}
