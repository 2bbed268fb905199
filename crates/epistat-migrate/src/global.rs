//! Global aggregator: per-virus daily totals across every country.

use epistat_core::{
  aggregate::{aggregate_global, GlobalAggregate},
  coerce::{safe_float, safe_int},
  diagnostic::{DiagnosticKind, Diagnostics},
  dimension::DimensionMap,
  source::{Measure, SourceRow},
  stat::NewGlobalStat,
  store::StatStore,
};
use serde::Serialize;

use crate::{
  error::{MigrationError, Result},
  loader::parse_fact_date,
};

/// Totals for the global phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalSummary {
  /// (date, virus) groups found in the source.
  pub groups:   usize,
  pub inserted: usize,
  pub skipped:  usize,
}

fn prepare_global(
  group: &GlobalAggregate,
  viruses: &DimensionMap,
  diagnostics: &mut Diagnostics,
) -> Option<NewGlobalStat> {
  let line = Some(group.first_line);

  let Some(virus_id) = viruses.get(&group.key.virus) else {
    diagnostics.push(
      DiagnosticKind::UnresolvedDimension,
      line,
      format!("no id for virus {:?} in global stats", group.key.virus),
    );
    return None;
  };
  let Some(date) = parse_fact_date(&group.key.date) else {
    diagnostics.push(
      DiagnosticKind::InvalidDate,
      line,
      format!("invalid date {:?} in global stats", group.key.date),
    );
    return None;
  };

  let m = &group.measures;
  Some(NewGlobalStat {
    virus_id,
    date,
    total_cases: safe_int(m.get(Measure::TotalCases)),
    total_deaths: safe_int(m.get(Measure::TotalDeaths)),
    mean_infection_rate: Some(safe_float(m.get(Measure::InfectionRate))),
    mean_death_rate_pop: Some(safe_float(m.get(Measure::DeathRatePop))),
  })
}

/// Aggregate the parsed source by (date, virus) and insert the groups not
/// already present, committing once.
pub async fn load_global<S: StatStore>(
  store: &S,
  rows: &[SourceRow],
  viruses: &DimensionMap,
  diagnostics: &mut Diagnostics,
) -> Result<GlobalSummary> {
  let groups = aggregate_global(rows);
  let prepared: Vec<NewGlobalStat> = groups
    .iter()
    .filter_map(|g| prepare_global(g, viruses, diagnostics))
    .collect();

  let outcome = store.insert_global_stats(prepared).await.map_err(|e| {
    tracing::error!(error = %e, "global stats insert failed");
    MigrationError::GlobalInsert(Box::new(e))
  })?;
  diagnostics.extend(outcome.diagnostics);

  let summary = GlobalSummary {
    groups:   groups.len(),
    inserted: outcome.inserted,
    skipped:  groups.len() - outcome.inserted,
  };
  tracing::info!(groups = summary.groups, inserted = summary.inserted, "global stats committed");
  Ok(summary)
}

#[cfg(test)]
mod tests {
  use epistat_core::{aggregate::GlobalKey, source::Measures};

  use super::*;

  fn group(virus: &str, date: &str, measures: Measures) -> GlobalAggregate {
    GlobalAggregate {
      key: GlobalKey { date: date.into(), virus: virus.into() },
      first_line: 4,
      measures,
    }
  }

  #[test]
  fn missing_means_become_zero() {
    let viruses: DimensionMap = [("flu".to_owned(), 3)].into_iter().collect();
    let m = Measures::default().with(Measure::TotalCases, 150.0);
    let mut diags = Diagnostics::new();

    let row = prepare_global(&group("flu", "2024-01-01", m), &viruses, &mut diags).unwrap();
    assert_eq!(row.virus_id, 3);
    assert_eq!(row.total_cases, 150);
    assert_eq!(row.total_deaths, 0);
    assert_eq!(row.mean_infection_rate, Some(0.0));
  }

  #[test]
  fn unresolved_virus_and_bad_date_are_skipped() {
    let viruses: DimensionMap = [("flu".to_owned(), 3)].into_iter().collect();
    let mut diags = Diagnostics::new();

    assert!(prepare_global(&group("covid", "2024-01-01", Measures::default()), &viruses, &mut diags).is_none());
    assert!(prepare_global(&group("flu", "2024-13-01", Measures::default()), &viruses, &mut diags).is_none());
    assert_eq!(diags.count(DiagnosticKind::UnresolvedDimension), 1);
    assert_eq!(diags.count(DiagnosticKind::InvalidDate), 1);
  }
}
