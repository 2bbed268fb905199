//! Batch loader for daily facts.

use chrono::NaiveDate;
use epistat_core::{
  aggregate::AggregatedStat,
  coerce::{safe_float, safe_int},
  diagnostic::{DiagnosticKind, Diagnostics},
  dimension::ResolvedDimensions,
  source::{Measure, Measures},
  stat::{NewDailyStat, Rates},
  store::StatStore,
};
use serde::Serialize;

use crate::error::{MigrationError, Result};

/// Strict `YYYY-MM-DD` parse: zero-padded, dash-separated, a real calendar
/// day.
pub fn parse_fact_date(raw: &str) -> Option<NaiveDate> {
  let bytes = raw.as_bytes();
  let shape_ok = bytes.len() == 10
    && bytes
      .iter()
      .enumerate()
      .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
  if !shape_ok {
    return None;
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn rates(m: &Measures) -> Rates {
  let rate = |measure| Some(safe_float(m.get(measure)));
  Rates {
    case_growth:              rate(Measure::CaseGrowth),
    death_rate:               rate(Measure::DeathRate),
    infection_rate:           rate(Measure::InfectionRate),
    death_rate_pop:           rate(Measure::DeathRatePop),
    infection_rate_vs_global: rate(Measure::InfectionRateVsGlobal),
    death_rate_pop_vs_global: rate(Measure::DeathRatePopVsGlobal),
  }
}

/// Resolve keys and coerce values for one aggregated row. Rows that cannot be
/// placed are reported and return `None`.
pub fn prepare_fact(
  stat: &AggregatedStat,
  dims: &ResolvedDimensions,
  diagnostics: &mut Diagnostics,
) -> Option<NewDailyStat> {
  let line = stat.first_line;
  let key = &stat.key;

  let (Some(country_id), Some(virus_id)) =
    (dims.countries.get(&key.country), dims.viruses.get(&key.virus))
  else {
    diagnostics.push(
      DiagnosticKind::UnresolvedDimension,
      Some(line),
      format!("no id for country {:?} / virus {:?}", key.country, key.virus),
    );
    return None;
  };

  let Some(date) = parse_fact_date(&key.date) else {
    diagnostics.push(
      DiagnosticKind::InvalidDate,
      Some(line),
      format!("invalid date {:?}; expected YYYY-MM-DD", key.date),
    );
    return None;
  };

  let m = &stat.measures;
  Some(NewDailyStat {
    line,
    country_id,
    virus_id,
    season_id: dims.seasons.resolve(key.season.as_deref()),
    date,
    new_cases: safe_int(m.get(Measure::NewCases)),
    new_deaths: safe_int(m.get(Measure::NewDeaths)),
    total_cases: safe_int(m.get(Measure::TotalCases)),
    total_deaths: safe_int(m.get(Measure::TotalDeaths)),
    rates: rates(m),
  })
}

/// Totals for one load phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
  /// Aggregated rows offered to the loader.
  pub rows:     usize,
  pub batches:  usize,
  pub inserted: usize,
  /// Rows not inserted, for any reason.
  pub skipped:  usize,
}

/// Load aggregated facts in batches of `batch_size`, one store transaction
/// per batch. Earlier batches stay committed if a later one fails.
pub async fn load_facts<S: StatStore>(
  store: &S,
  facts: &[AggregatedStat],
  dims: &ResolvedDimensions,
  batch_size: usize,
  diagnostics: &mut Diagnostics,
) -> Result<LoadSummary> {
  let batch_size = batch_size.max(1);
  let total = facts.len().div_ceil(batch_size);
  let mut summary = LoadSummary { rows: facts.len(), ..LoadSummary::default() };

  for (i, chunk) in facts.chunks(batch_size).enumerate() {
    let batch = i + 1;
    let prepared: Vec<NewDailyStat> = chunk
      .iter()
      .filter_map(|stat| prepare_fact(stat, dims, diagnostics))
      .collect();
    summary.batches += 1;

    if prepared.is_empty() {
      summary.skipped += chunk.len();
      tracing::debug!(batch, total, "batch had no loadable rows");
      continue;
    }

    let outcome = store.insert_daily_batch(prepared).await.map_err(|e| {
      tracing::error!(batch, total, error = %e, "batch insert failed; batch rolled back");
      MigrationError::BatchInsert { batch, source: Box::new(e) }
    })?;

    summary.inserted += outcome.inserted;
    summary.skipped += chunk.len() - outcome.inserted;
    diagnostics.extend(outcome.diagnostics);
    tracing::info!(batch, total, inserted = outcome.inserted, "batch committed");
  }

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use epistat_core::{
    aggregate::FactKey,
    dimension::{DimensionMap, SeasonLookup},
  };

  use super::*;

  fn dims() -> ResolvedDimensions {
    ResolvedDimensions {
      countries: [("France".to_owned(), 1)].into_iter().collect(),
      viruses:   [("covid".to_owned(), 7)].into_iter().collect(),
      seasons:   SeasonLookup::ByName(DimensionMap::new()),
    }
  }

  fn stat(country: &str, date: &str, measures: Measures) -> AggregatedStat {
    AggregatedStat {
      key: FactKey {
        date:    date.into(),
        country: country.into(),
        virus:   "covid".into(),
        season:  None,
      },
      first_line: 9,
      rows: 1,
      measures,
    }
  }

  #[test]
  fn strict_date_parse() {
    assert_eq!(parse_fact_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
    assert_eq!(parse_fact_date("2023-02-29"), None);
    assert_eq!(parse_fact_date("2024-1-05"), None);
    assert_eq!(parse_fact_date("2024/01/05"), None);
    assert_eq!(parse_fact_date("2024-01-05T00:00"), None);
    assert_eq!(parse_fact_date("+202-01-05"), None);
    assert_eq!(parse_fact_date(""), None);
  }

  #[test]
  fn prepared_fact_coerces_measures() {
    let m = Measures::default()
      .with(Measure::TotalCases, 12.9)
      .with(Measure::DeathRate, 0.5);
    let mut diags = Diagnostics::new();
    let fact = prepare_fact(&stat("France", "2024-01-01", m), &dims(), &mut diags).unwrap();

    assert!(diags.is_empty());
    assert_eq!(fact.country_id, 1);
    assert_eq!(fact.virus_id, 7);
    assert_eq!(fact.line, 9);
    assert_eq!(fact.total_cases, 12);
    assert_eq!(fact.new_cases, 0);
    assert_eq!(fact.rates.death_rate, Some(0.5));
    assert_eq!(fact.rates.case_growth, Some(0.0));
    assert_eq!(fact.season_id, None);
  }

  #[test]
  fn unknown_country_is_reported() {
    let mut diags = Diagnostics::new();
    let fact = prepare_fact(&stat("Atlantis", "2024-01-01", Measures::default()), &dims(), &mut diags);
    assert!(fact.is_none());
    assert_eq!(diags.count(DiagnosticKind::UnresolvedDimension), 1);
  }

  #[test]
  fn malformed_date_is_reported() {
    let mut diags = Diagnostics::new();
    let fact = prepare_fact(&stat("France", "01/02/2024", Measures::default()), &dims(), &mut diags);
    assert!(fact.is_none());
    assert_eq!(diags.count(DiagnosticKind::InvalidDate), 1);
    assert_eq!(diags.iter().next().unwrap().line, Some(9));
  }

  #[test]
  fn default_season_applies_to_every_fact() {
    let mut d = dims();
    d.seasons = SeasonLookup::Default(1);
    let mut diags = Diagnostics::new();
    let fact = prepare_fact(&stat("France", "2024-01-01", Measures::default()), &d, &mut diags);
    assert_eq!(fact.unwrap().season_id, Some(1));
  }
}
