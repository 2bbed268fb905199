//! Source CSV reader.
//!
//! Parses the snapshot file into [`SourceRow`]s. Structural problems (no
//! header, missing required column) are fatal; problems confined to one record
//! become [`Diagnostic`](crate::diagnostic::Diagnostic)s and the record is
//! dropped or the offending cell treated as missing.

use std::{fs::File, io::Read, path::Path};

use crate::{
  coerce::{parse_measure, report_anomaly},
  diagnostic::{DiagnosticKind, Diagnostics},
  Error, Result,
};

// ─── Measures ────────────────────────────────────────────────────────────────

pub const MEASURE_COUNT: usize = 10;

/// The numeric columns carried by each observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
  NewCases,
  NewDeaths,
  TotalCases,
  TotalDeaths,
  CaseGrowth,
  DeathRate,
  InfectionRate,
  DeathRatePop,
  InfectionRateVsGlobal,
  DeathRatePopVsGlobal,
}

impl Measure {
  pub const ALL: [Measure; MEASURE_COUNT] = [
    Self::NewCases,
    Self::NewDeaths,
    Self::TotalCases,
    Self::TotalDeaths,
    Self::CaseGrowth,
    Self::DeathRate,
    Self::InfectionRate,
    Self::DeathRatePop,
    Self::InfectionRateVsGlobal,
    Self::DeathRatePopVsGlobal,
  ];

  /// CSV header name.
  pub fn column(self) -> &'static str {
    match self {
      Self::NewCases => "new_cases",
      Self::NewDeaths => "new_deaths",
      Self::TotalCases => "total_cases",
      Self::TotalDeaths => "total_deaths",
      Self::CaseGrowth => "case_growth",
      Self::DeathRate => "death_rate",
      Self::InfectionRate => "infection_rate",
      Self::DeathRatePop => "death_rate_pop",
      Self::InfectionRateVsGlobal => "infection_rate_vs_global",
      Self::DeathRatePopVsGlobal => "death_rate_pop_vs_global",
    }
  }

  pub(crate) fn index(self) -> usize { self as usize }
}

/// One optional value per [`Measure`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measures([Option<f64>; MEASURE_COUNT]);

impl Measures {
  pub fn get(&self, m: Measure) -> Option<f64> { self.0[m.index()] }

  pub fn set(&mut self, m: Measure, value: Option<f64>) {
    self.0[m.index()] = value;
  }

  /// Builder-style [`set`](Self::set), handy in tests.
  pub fn with(mut self, m: Measure, value: f64) -> Self {
    self.set(m, Some(value));
    self
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One parsed observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
  /// 1-based line in the file; the header is line 1.
  pub line:       usize,
  pub country:    String,
  pub virus:      String,
  /// Raw date text; validated by the loader, not here.
  pub date:       String,
  pub season:     Option<String>,
  pub population: Option<i64>,
  pub measures:   Measures,
}

/// Everything read from one source file.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
  pub rows:        Vec<SourceRow>,
  /// Whether the file has a `season` column at all.
  pub has_season:  bool,
  pub diagnostics: Diagnostics,
}

// ─── Reader ──────────────────────────────────────────────────────────────────

const REQUIRED: [&str; 3] = ["country", "virus", "date"];

struct Columns {
  country:    usize,
  virus:      usize,
  date:       usize,
  season:     Option<usize>,
  population: Option<usize>,
  measures:   Vec<(Measure, usize)>,
}

impl Columns {
  fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
    let names: Vec<String> = headers
      .iter()
      .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
      .collect();
    let find = |name: &str| names.iter().position(|h| h == name);
    let require = |name: &'static str| find(name).ok_or(Error::MissingColumn(name));

    Ok(Self {
      country:    require(REQUIRED[0])?,
      virus:      require(REQUIRED[1])?,
      date:       require(REQUIRED[2])?,
      season:     find("season"),
      population: find("population"),
      measures:   Measure::ALL
        .iter()
        .filter_map(|&m| find(m.column()).map(|i| (m, i)))
        .collect(),
    })
  }
}

fn cell(record: &csv::StringRecord, idx: usize) -> Option<&str> {
  record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a numeric cell, reporting unparseable values.
fn read_number(
  record: &csv::StringRecord,
  idx: usize,
  column: &str,
  line: usize,
  diagnostics: &mut Diagnostics,
) -> Option<f64> {
  let raw = cell(record, idx)?;
  match parse_measure(raw) {
    Ok(v) => v,
    Err(e) => {
      report_anomaly(&format!("line {line}, column {column}"), &e);
      diagnostics.push(
        DiagnosticKind::Conversion,
        Some(line),
        format!("column {column}: {e}"),
      );
      None
    }
  }
}

/// Read a source table from any reader.
pub fn read_source<R: Read>(input: R) -> Result<SourceTable> {
  let mut reader = csv::ReaderBuilder::new()
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(input);

  let columns = Columns::from_headers(reader.headers()?)?;
  let mut table = SourceTable {
    has_season: columns.season.is_some(),
    ..SourceTable::default()
  };

  for (idx, result) in reader.records().enumerate() {
    // A quoted field may span lines, so take the line the record starts on.
    let fallback = idx + 2;
    let record = match result {
      Ok(r) => r,
      Err(e) => {
        let line = e.position().map_or(fallback, |p| p.line() as usize);
        table.diagnostics.push(
          DiagnosticKind::MalformedRecord,
          Some(line),
          e.to_string(),
        );
        continue;
      }
    };
    let line = record.position().map_or(fallback, |p| p.line() as usize);

    let (Some(country), Some(virus), Some(date)) = (
      cell(&record, columns.country),
      cell(&record, columns.virus),
      cell(&record, columns.date),
    ) else {
      table.diagnostics.push(
        DiagnosticKind::MissingValue,
        Some(line),
        "country, virus and date are required",
      );
      continue;
    };

    let mut measures = Measures::default();
    for &(m, i) in &columns.measures {
      let value = read_number(&record, i, m.column(), line, &mut table.diagnostics);
      measures.set(m, value);
    }

    let population = columns
      .population
      .and_then(|i| read_number(&record, i, "population", line, &mut table.diagnostics))
      .map(|p| p as i64);

    table.rows.push(SourceRow {
      line,
      country: country.to_owned(),
      virus: virus.to_owned(),
      date: date.to_owned(),
      season: columns.season.and_then(|i| cell(&record, i)).map(str::to_owned),
      population,
      measures,
    });
  }

  Ok(table)
}

/// Read a source table from a file on disk.
pub fn read_source_path(path: &Path) -> Result<SourceTable> {
  let file = File::open(path)
    .map_err(|source| Error::FileAccess { path: path.to_path_buf(), source })?;
  read_source(file)
}
