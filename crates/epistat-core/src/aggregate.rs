//! Fact and global aggregation.
//!
//! Overlapping source feeds can repeat an observation, so rows are grouped by
//! their logical key and each group is reduced to a single row with a fixed
//! per-column rule. Aggregation is pure; it performs no I/O.
//!
//! | measure                                        | reducer |
//! |------------------------------------------------|---------|
//! | `total_cases`, `total_deaths`                  | max     |
//! | `new_cases`, `new_deaths`                      | sum     |
//! | the six rate columns                           | mean    |
//!
//! Missing values are ignored by every reducer. A group in which a measure is
//! missing everywhere yields a missing value for it.

use std::collections::BTreeMap;

use crate::source::{Measure, Measures, SourceRow, MEASURE_COUNT};

/// How a group of values collapses into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
  Max,
  Sum,
  Mean,
}

impl Measure {
  /// The reducer applied when collapsing duplicate daily observations.
  pub fn daily_reducer(self) -> Reducer {
    match self {
      Self::TotalCases | Self::TotalDeaths => Reducer::Max,
      Self::NewCases | Self::NewDeaths => Reducer::Sum,
      Self::CaseGrowth
      | Self::DeathRate
      | Self::InfectionRate
      | Self::DeathRatePop
      | Self::InfectionRateVsGlobal
      | Self::DeathRatePopVsGlobal => Reducer::Mean,
    }
  }
}

/// Measures carried into the global table, with their reducers across
/// countries.
pub const GLOBAL_PLAN: [(Measure, Reducer); 4] = [
  (Measure::TotalCases, Reducer::Sum),
  (Measure::TotalDeaths, Reducer::Sum),
  (Measure::InfectionRate, Reducer::Mean),
  (Measure::DeathRatePop, Reducer::Mean),
];

// ─── Accumulation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
  sum:   f64,
  max:   Option<f64>,
  count: usize,
}

impl Accumulator {
  fn push(&mut self, value: Option<f64>) {
    if let Some(v) = value {
      self.sum += v;
      self.count += 1;
      self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }
  }

  fn finish(&self, reducer: Reducer) -> Option<f64> {
    if self.count == 0 {
      return None;
    }
    match reducer {
      Reducer::Max => self.max,
      Reducer::Sum => Some(self.sum),
      Reducer::Mean => Some(self.sum / self.count as f64),
    }
  }
}

#[derive(Debug, Clone)]
struct Group {
  first_line: usize,
  rows:       usize,
  acc:        [Accumulator; MEASURE_COUNT],
}

impl Group {
  fn new(first_line: usize) -> Self {
    Self { first_line, rows: 0, acc: Default::default() }
  }

  fn push(&mut self, measures: &Measures) {
    self.rows += 1;
    for m in Measure::ALL {
      self.acc[m.index()].push(measures.get(m));
    }
  }

  fn finish<'a>(&self, plan: impl IntoIterator<Item = &'a (Measure, Reducer)>) -> Measures {
    let mut out = Measures::default();
    for &(m, reducer) in plan {
      out.set(m, self.acc[m.index()].finish(reducer));
    }
    out
  }
}

// ─── Daily facts ─────────────────────────────────────────────────────────────

/// Grouping key for daily facts. Ordering gives a deterministic output order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FactKey {
  pub date:    String,
  pub country: String,
  pub virus:   String,
  pub season:  Option<String>,
}

/// One logical daily row per [`FactKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedStat {
  pub key:        FactKey,
  /// Line of the first source record in the group.
  pub first_line: usize,
  /// Number of source records collapsed into this row.
  pub rows:       usize,
  pub measures:   Measures,
}

/// Collapse source rows into one row per (date, country, virus, season).
pub fn aggregate_facts(rows: &[SourceRow]) -> Vec<AggregatedStat> {
  let mut groups: BTreeMap<FactKey, Group> = BTreeMap::new();
  for row in rows {
    let key = FactKey {
      date:    row.date.clone(),
      country: row.country.clone(),
      virus:   row.virus.clone(),
      season:  row.season.clone(),
    };
    groups
      .entry(key)
      .or_insert_with(|| Group::new(row.line))
      .push(&row.measures);
  }

  let plan: Vec<(Measure, Reducer)> =
    Measure::ALL.iter().map(|&m| (m, m.daily_reducer())).collect();

  groups
    .into_iter()
    .map(|(key, group)| AggregatedStat {
      key,
      first_line: group.first_line,
      rows: group.rows,
      measures: group.finish(&plan),
    })
    .collect()
}

// ─── Global rows ─────────────────────────────────────────────────────────────

/// Grouping key for global rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlobalKey {
  pub date:  String,
  pub virus: String,
}

/// One row per (date, virus) summarising all countries.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalAggregate {
  pub key:        GlobalKey,
  pub first_line: usize,
  /// Only the measures in [`GLOBAL_PLAN`] are populated.
  pub measures:   Measures,
}

/// Regroup the parsed source by (date, virus) across every country.
pub fn aggregate_global(rows: &[SourceRow]) -> Vec<GlobalAggregate> {
  let mut groups: BTreeMap<GlobalKey, Group> = BTreeMap::new();
  for row in rows {
    let key = GlobalKey { date: row.date.clone(), virus: row.virus.clone() };
    groups
      .entry(key)
      .or_insert_with(|| Group::new(row.line))
      .push(&row.measures);
  }

  groups
    .into_iter()
    .map(|(key, group)| GlobalAggregate {
      key,
      first_line: group.first_line,
      measures: group.finish(&GLOBAL_PLAN),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(
    line: usize,
    date: &str,
    country: &str,
    virus: &str,
    season: Option<&str>,
    measures: Measures,
  ) -> SourceRow {
    SourceRow {
      line,
      country: country.into(),
      virus: virus.into(),
      date: date.into(),
      season: season.map(Into::into),
      population: None,
      measures,
    }
  }

  #[test]
  fn duplicates_are_reduced_per_column() {
    let a = Measures::default()
      .with(Measure::TotalCases, 100.0)
      .with(Measure::NewCases, 5.0)
      .with(Measure::DeathRate, 0.2);
    let b = Measures::default()
      .with(Measure::TotalCases, 120.0)
      .with(Measure::NewCases, 7.0)
      .with(Measure::DeathRate, 0.4);
    let rows = vec![
      row(2, "2024-01-01", "France", "covid", Some("winter"), a),
      row(3, "2024-01-01", "France", "covid", Some("winter"), b),
    ];

    let out = aggregate_facts(&rows);
    assert_eq!(out.len(), 1);
    let stat = &out[0];
    assert_eq!(stat.first_line, 2);
    assert_eq!(stat.rows, 2);
    assert_eq!(stat.measures.get(Measure::TotalCases), Some(120.0));
    assert_eq!(stat.measures.get(Measure::NewCases), Some(12.0));
    let mean = stat.measures.get(Measure::DeathRate).unwrap();
    assert!((mean - 0.3).abs() < 1e-12);
  }

  #[test]
  fn missing_values_are_ignored_by_reducers() {
    let a = Measures::default().with(Measure::InfectionRate, 0.5);
    let b = Measures::default();
    let rows = vec![
      row(2, "2024-01-01", "France", "covid", None, a),
      row(3, "2024-01-01", "France", "covid", None, b),
    ];

    let out = aggregate_facts(&rows);
    assert_eq!(out[0].measures.get(Measure::InfectionRate), Some(0.5));
    assert_eq!(out[0].measures.get(Measure::TotalCases), None);
    assert_eq!(out[0].measures.get(Measure::NewCases), None);
  }

  #[test]
  fn season_is_part_of_the_grouping_key() {
    let m = Measures::default();
    let rows = vec![
      row(2, "2024-01-01", "France", "covid", Some("winter"), m),
      row(3, "2024-01-01", "France", "covid", Some("spring"), m),
    ];
    assert_eq!(aggregate_facts(&rows).len(), 2);
  }

  #[test]
  fn output_is_ordered_by_key() {
    let m = Measures::default();
    let rows = vec![
      row(2, "2024-01-02", "Spain", "covid", None, m),
      row(3, "2024-01-01", "Spain", "covid", None, m),
      row(4, "2024-01-01", "France", "covid", None, m),
    ];
    let keys: Vec<(String, String)> = aggregate_facts(&rows)
      .into_iter()
      .map(|s| (s.key.date, s.key.country))
      .collect();
    assert_eq!(keys, vec![
      ("2024-01-01".into(), "France".into()),
      ("2024-01-01".into(), "Spain".into()),
      ("2024-01-02".into(), "Spain".into()),
    ]);
  }

  #[test]
  fn global_sums_totals_and_averages_rates_across_countries() {
    let fr = Measures::default()
      .with(Measure::TotalCases, 100.0)
      .with(Measure::TotalDeaths, 3.0)
      .with(Measure::InfectionRate, 0.1)
      .with(Measure::DeathRatePop, 0.01)
      .with(Measure::NewCases, 9.0);
    let es = Measures::default()
      .with(Measure::TotalCases, 50.0)
      .with(Measure::TotalDeaths, 1.0)
      .with(Measure::InfectionRate, 0.3);
    let rows = vec![
      row(2, "2024-01-01", "France", "covid", None, fr),
      row(3, "2024-01-01", "Spain", "covid", None, es),
      row(4, "2024-01-01", "Spain", "flu", None, es),
    ];

    let out = aggregate_global(&rows);
    assert_eq!(out.len(), 2);
    let covid = out.iter().find(|g| g.key.virus == "covid").unwrap();
    assert_eq!(covid.measures.get(Measure::TotalCases), Some(150.0));
    assert_eq!(covid.measures.get(Measure::TotalDeaths), Some(4.0));
    assert!((covid.measures.get(Measure::InfectionRate).unwrap() - 0.2).abs() < 1e-12);
    assert_eq!(covid.measures.get(Measure::DeathRatePop), Some(0.01));
    // Columns outside the global plan are not carried.
    assert_eq!(covid.measures.get(Measure::NewCases), None);
  }
}
