//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use epistat_core::{
  diagnostic::DiagnosticKind,
  dimension::{CountrySeed, DEFAULT_SEASON_ID},
  ledger::MigrationStatus,
  stat::{NewDailyStat, NewGlobalStat, Rates},
  store::StatStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn daily(line: usize, country_id: i64, virus_id: i64, day: &str) -> NewDailyStat {
  NewDailyStat {
    line,
    country_id,
    virus_id,
    season_id: None,
    date: date(day),
    new_cases: 1,
    new_deaths: 0,
    total_cases: 10,
    total_deaths: 1,
    rates: Rates { infection_rate: Some(0.25), ..Rates::default() },
  }
}

/// One country and one virus, returning their ids.
async fn seed(s: &SqliteStore) -> (i64, i64) {
  let countries = s
    .resolve_countries(vec![CountrySeed { name: "France".into(), population: Some(68) }])
    .await
    .unwrap();
  let viruses = s.resolve_viruses(vec!["covid".into()]).await.unwrap();
  (countries.get("France").unwrap(), viruses.get("covid").unwrap())
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_file_has_no_ledger_record() {
  let s = store().await;
  assert!(s.migration("data.csv").await.unwrap().is_none());
}

#[tokio::test]
async fn record_migration_replaces_previous_row() {
  let s = store().await;

  s.record_migration("data.csv", "aaa", MigrationStatus::InProgress)
    .await
    .unwrap();
  let done = s
    .record_migration("data.csv", "aaa", MigrationStatus::Completed)
    .await
    .unwrap();

  let fetched = s.migration("data.csv").await.unwrap().unwrap();
  assert_eq!(fetched.status, MigrationStatus::Completed);
  assert_eq!(fetched.checksum, "aaa");
  assert_eq!(fetched.migrated_at.timestamp(), done.migrated_at.timestamp());
  assert_eq!(s.counts().await.unwrap().migrations, 1);
}

#[tokio::test]
async fn ledger_is_keyed_by_filename() {
  let s = store().await;
  s.record_migration("a.csv", "1", MigrationStatus::Completed).await.unwrap();
  s.record_migration("b.csv", "2", MigrationStatus::Failed).await.unwrap();

  assert_eq!(s.counts().await.unwrap().migrations, 2);
  let b = s.migration("b.csv").await.unwrap().unwrap();
  assert_eq!(b.status, MigrationStatus::Failed);
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolving_twice_reuses_ids() {
  let s = store().await;
  let first = s.resolve_viruses(vec!["covid".into(), "flu".into()]).await.unwrap();
  let second = s.resolve_viruses(vec!["flu".into(), "covid".into()]).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(s.counts().await.unwrap().viruses, 2);
}

#[tokio::test]
async fn existing_country_keeps_its_population() {
  let s = store().await;
  s.resolve_countries(vec![CountrySeed { name: "Spain".into(), population: Some(47) }])
    .await
    .unwrap();
  s.resolve_countries(vec![CountrySeed { name: "Spain".into(), population: Some(99) }])
    .await
    .unwrap();

  let spain = s.country_by_name("Spain").await.unwrap().unwrap();
  assert_eq!(spain.population, Some(47));
}

#[tokio::test]
async fn country_population_may_be_null() {
  let s = store().await;
  s.resolve_countries(vec![CountrySeed { name: "Chad".into(), population: None }])
    .await
    .unwrap();
  let chad = s.country_by_name("Chad").await.unwrap().unwrap();
  assert_eq!(chad.population, None);
}

#[tokio::test]
async fn default_season_is_idempotent() {
  let s = store().await;
  assert_eq!(s.ensure_default_season().await.unwrap(), DEFAULT_SEASON_ID);
  assert_eq!(s.ensure_default_season().await.unwrap(), DEFAULT_SEASON_ID);
  assert_eq!(s.counts().await.unwrap().seasons, 1);
}

// ─── Daily facts ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn daily_batch_inserts_and_reads_back() {
  let s = store().await;
  let (fr, covid) = seed(&s).await;

  let outcome = s
    .insert_daily_batch(vec![daily(2, fr, covid, "2024-01-01"), daily(3, fr, covid, "2024-01-02")])
    .await
    .unwrap();
  assert_eq!(outcome.inserted, 2);
  assert!(outcome.diagnostics.is_empty());

  let stat = s.daily_stat(fr, covid, date("2024-01-02")).await.unwrap().unwrap();
  assert_eq!(stat.total_cases, 10);
  assert_eq!(stat.rates.infection_rate, Some(0.25));
  assert_eq!(stat.rates.death_rate, None);
  assert_eq!(stat.season_id, None);
}

#[tokio::test]
async fn existing_daily_rows_are_skipped() {
  let s = store().await;
  let (fr, covid) = seed(&s).await;
  s.insert_daily_batch(vec![daily(2, fr, covid, "2024-01-01")]).await.unwrap();

  let outcome = s
    .insert_daily_batch(vec![daily(2, fr, covid, "2024-01-01"), daily(3, fr, covid, "2024-01-03")])
    .await
    .unwrap();
  assert_eq!(outcome.inserted, 1);
  assert_eq!(outcome.diagnostics.count(DiagnosticKind::AlreadyPresent), 1);
  assert_eq!(s.counts().await.unwrap().daily_stats, 2);
}

#[tokio::test]
async fn repeated_key_within_batch_keeps_first_row() {
  let s = store().await;
  let (fr, covid) = seed(&s).await;

  let mut second = daily(5, fr, covid, "2024-01-01");
  second.total_cases = 999;
  let outcome = s
    .insert_daily_batch(vec![daily(4, fr, covid, "2024-01-01"), second])
    .await
    .unwrap();

  assert_eq!(outcome.inserted, 1);
  assert_eq!(outcome.diagnostics.count(DiagnosticKind::DuplicateKey), 1);
  let stat = s.daily_stat(fr, covid, date("2024-01-01")).await.unwrap().unwrap();
  assert_eq!(stat.total_cases, 10);
}

#[tokio::test]
async fn foreign_key_violation_rolls_back_the_batch() {
  let s = store().await;
  let (fr, covid) = seed(&s).await;

  let result = s
    .insert_daily_batch(vec![daily(2, fr, covid, "2024-01-01"), daily(3, 404, covid, "2024-01-01")])
    .await;
  assert!(result.is_err());
  assert_eq!(s.counts().await.unwrap().daily_stats, 0);
}

// ─── Global rows ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn global_rows_are_inserted_once() {
  let s = store().await;
  let (_, covid) = seed(&s).await;
  let row = NewGlobalStat {
    virus_id:            covid,
    date:                date("2024-01-01"),
    total_cases:         150,
    total_deaths:        4,
    mean_infection_rate: Some(0.2),
    mean_death_rate_pop: None,
  };

  let first = s.insert_global_stats(vec![row.clone()]).await.unwrap();
  assert_eq!(first.inserted, 1);
  let again = s.insert_global_stats(vec![row]).await.unwrap();
  assert_eq!(again.inserted, 0);
  assert_eq!(again.diagnostics.count(DiagnosticKind::AlreadyPresent), 1);

  let rows = s.global_stats_for_virus(covid).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].total_cases, 150);
  assert_eq!(rows[0].mean_death_rate_pop, None);
}

#[tokio::test]
async fn global_rows_are_ordered_by_date() {
  let s = store().await;
  let (_, covid) = seed(&s).await;
  let at = |d: &str| NewGlobalStat {
    virus_id:            covid,
    date:                date(d),
    total_cases:         0,
    total_deaths:        0,
    mean_infection_rate: None,
    mean_death_rate_pop: None,
  };
  s.insert_global_stats(vec![at("2024-01-03"), at("2024-01-01"), at("2024-01-02")])
    .await
    .unwrap();

  let dates: Vec<NaiveDate> = s
    .global_stats_for_virus(covid)
    .await
    .unwrap()
    .into_iter()
    .map(|g| g.date)
    .collect();
  assert_eq!(dates, vec![date("2024-01-01"), date("2024-01-02"), date("2024-01-03")]);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_store_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("epistat.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    seed(&s).await;
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let counts = s.counts().await.unwrap();
  assert_eq!(counts.countries, 1);
  assert_eq!(counts.viruses, 1);
  assert!(s.virus_by_name("covid").await.unwrap().is_some());
}
