//! Dimension natural keys and per-run surrogate id lookups.
//!
//! The maps built here live for one migration run only. They are returned by
//! the resolver and consulted by the loaders; nothing persists them.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::source::SourceRow;

/// Surrogate id of the synthetic season used when the source has no season
/// column.
pub const DEFAULT_SEASON_ID: i64 = 1;

/// Name of the synthetic default season row.
pub const DEFAULT_SEASON_NAME: &str = "default";

/// The three dimension tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
  Country,
  Virus,
  Season,
}

impl Dimension {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Country => "country",
      Self::Virus => "virus",
      Self::Season => "season",
    }
  }
}

impl std::fmt::Display for Dimension {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A country as first seen in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountrySeed {
  pub name:       String,
  /// First non-null population seen for this country.
  pub population: Option<i64>,
}

/// Natural key → surrogate id for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionMap(HashMap<String, i64>);

impl DimensionMap {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, name: impl Into<String>, id: i64) {
    self.0.insert(name.into(), id);
  }

  pub fn get(&self, name: &str) -> Option<i64> { self.0.get(name).copied() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<(String, i64)> for DimensionMap {
  fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// How facts find their season id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeasonLookup {
  /// The source has a season column; look names up.
  ByName(DimensionMap),
  /// The source has no season column; every fact uses this id.
  Default(i64),
}

impl SeasonLookup {
  /// Season id for a fact. `None` means the fact has no season.
  pub fn resolve(&self, season: Option<&str>) -> Option<i64> {
    match self {
      Self::ByName(map) => season.and_then(|s| map.get(s)),
      Self::Default(id) => Some(*id),
    }
  }
}

/// All surrogate lookups produced by the resolver.
#[derive(Debug, Clone)]
pub struct ResolvedDimensions {
  pub countries: DimensionMap,
  pub viruses:   DimensionMap,
  pub seasons:   SeasonLookup,
}

// ─── Extraction ──────────────────────────────────────────────────────────────

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut seen = HashSet::new();
  values
    .filter(|v| seen.insert(*v))
    .map(str::to_owned)
    .collect()
}

/// Distinct countries in first-seen order, each with its first non-null
/// population.
pub fn distinct_countries(rows: &[SourceRow]) -> Vec<CountrySeed> {
  let mut index: HashMap<&str, usize> = HashMap::new();
  let mut seeds: Vec<CountrySeed> = Vec::new();
  for row in rows {
    match index.get(row.country.as_str()) {
      Some(&i) => {
        if seeds[i].population.is_none() {
          seeds[i].population = row.population;
        }
      }
      None => {
        index.insert(&row.country, seeds.len());
        seeds.push(CountrySeed {
          name:       row.country.clone(),
          population: row.population,
        });
      }
    }
  }
  seeds
}

/// Distinct virus names in first-seen order.
pub fn distinct_viruses(rows: &[SourceRow]) -> Vec<String> {
  distinct(rows.iter().map(|r| r.virus.as_str()))
}

/// Distinct non-empty season names in first-seen order.
pub fn distinct_seasons(rows: &[SourceRow]) -> Vec<String> {
  distinct(rows.iter().filter_map(|r| r.season.as_deref()))
}
