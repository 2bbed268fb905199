//! epistat-migrate binary.
//!
//! Loads `.env`, reads `epistat.toml` (or the path given with `--config`),
//! applies `EPISTAT_*` environment variables and command-line overrides, then
//! migrates the configured CSV file into SQLite.
//!
//! ```sh
//! EPISTAT_DATABASE_URL=sqlite://epistat.db \
//!   cargo run -p epistat-migrate -- --csv data/snapshot.csv
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use epistat_migrate::{open_store, MigrateConfig, MigrationOutcome, Migrator, Overrides};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Migrate an epidemiological CSV snapshot into SQLite")]
struct Cli {
  /// Path to the TOML configuration file. A missing file is ignored.
  #[arg(short, long, default_value = "epistat.toml")]
  config: PathBuf,

  /// Database URL: `sqlite://path`, a plain path, or `:memory:`.
  #[arg(long)]
  database_url: Option<String>,

  /// CSV snapshot to migrate.
  #[arg(long = "csv")]
  csv_file_path: Option<PathBuf>,

  /// Migrate even if the file is unchanged since the last completed run.
  #[arg(short, long)]
  force: bool,

  /// Daily facts per insert transaction.
  #[arg(long)]
  batch_size: Option<usize>,

  /// Print the run report as JSON on stdout.
  #[arg(long)]
  json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // A missing .env is fine.
  let _ = dotenvy::dotenv();

  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let overrides = Overrides {
    database_url:    cli.database_url,
    csv_file_path:   cli.csv_file_path,
    force_migration: cli.force.then_some(true),
    batch_size:      cli.batch_size,
  };
  let cfg = MigrateConfig::load(&cli.config, &overrides)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  tracing::info!(database = %cfg.database, csv = %cfg.csv_file_path.display(), "configuration loaded");

  // Validate the source, then open the SQLite store.
  let store = open_store(&cfg).await.context("migration failed")?;

  let outcome = Migrator::new(&cfg, store)
    .run()
    .await
    .context("migration failed")?;

  match &outcome {
    MigrationOutcome::Skipped { filename, reason } => {
      tracing::info!(%filename, %reason, "nothing to do");
    }
    MigrationOutcome::Completed(report) => {
      tracing::info!(
        filename = %report.filename,
        daily_stats = report.counts.daily_stats,
        global_stats = report.counts.global_stats,
        diagnostics = report.diagnostics.len(),
        "done"
      );
    }
  }

  if cli.json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
  }

  Ok(())
}
