//! SQL schema for the epistat SQLite store.
//!
//! Executed once at connection startup. This crate does not version the
//! schema; `PRAGMA user_version` only marks the layout in use.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS countries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL UNIQUE,
    population  INTEGER
);

CREATE TABLE IF NOT EXISTS viruses (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS seasons (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL UNIQUE
);

-- Season does not take part in uniqueness: the first writer of a
-- (country, virus, date) wins.
CREATE TABLE IF NOT EXISTS daily_stats (
    id                        INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id                INTEGER NOT NULL REFERENCES countries(id),
    virus_id                  INTEGER NOT NULL REFERENCES viruses(id),
    season_id                 INTEGER REFERENCES seasons(id),
    date                      TEXT    NOT NULL,   -- YYYY-MM-DD
    new_cases                 INTEGER NOT NULL DEFAULT 0,
    new_deaths                INTEGER NOT NULL DEFAULT 0,
    total_cases               INTEGER NOT NULL DEFAULT 0,
    total_deaths              INTEGER NOT NULL DEFAULT 0,
    case_growth               REAL,
    death_rate                REAL,
    infection_rate            REAL,
    death_rate_pop            REAL,
    infection_rate_vs_global  REAL,
    death_rate_pop_vs_global  REAL,
    UNIQUE (country_id, virus_id, date)
);

CREATE TABLE IF NOT EXISTS global_stats (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    virus_id             INTEGER NOT NULL REFERENCES viruses(id),
    date                 TEXT    NOT NULL,
    total_cases          INTEGER,
    total_deaths         INTEGER,
    mean_infection_rate  REAL,
    mean_death_rate_pop  REAL,
    UNIQUE (virus_id, date)
);

-- One row per source filename; replaced (delete + insert) on every write.
CREATE TABLE IF NOT EXISTS migration_ledger (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    filename     TEXT NOT NULL UNIQUE,
    checksum     TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('in_progress', 'completed', 'failed')),
    migrated_at  TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS daily_stats_date_idx  ON daily_stats(date);
CREATE INDEX IF NOT EXISTS global_stats_date_idx ON global_stats(date);

PRAGMA user_version = 1;
";
