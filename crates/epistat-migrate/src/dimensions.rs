//! Dimension resolver: one committed transaction per dimension.

use epistat_core::{
  dimension::{
    distinct_countries, distinct_seasons, distinct_viruses, Dimension, ResolvedDimensions,
    SeasonLookup,
  },
  source::SourceTable,
  store::StatStore,
};

use crate::error::{MigrationError, Result};

fn write_error<E>(dimension: Dimension) -> impl FnOnce(E) -> MigrationError
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |e| {
    tracing::error!(%dimension, error = %e, "dimension resolution failed");
    MigrationError::DimensionWrite { dimension, source: Box::new(e) }
  }
}

/// Map every country, virus and season in `table` to a surrogate id,
/// creating rows as needed.
///
/// Without a season column no seasons are read; every fact gets the default
/// season instead.
pub async fn resolve_dimensions<S: StatStore>(
  store: &S,
  table: &SourceTable,
) -> Result<ResolvedDimensions> {
  let countries = store
    .resolve_countries(distinct_countries(&table.rows))
    .await
    .map_err(write_error(Dimension::Country))?;
  tracing::info!(count = countries.len(), "countries resolved");

  let viruses = store
    .resolve_viruses(distinct_viruses(&table.rows))
    .await
    .map_err(write_error(Dimension::Virus))?;
  tracing::info!(count = viruses.len(), "viruses resolved");

  let seasons = if table.has_season {
    let map = store
      .resolve_seasons(distinct_seasons(&table.rows))
      .await
      .map_err(write_error(Dimension::Season))?;
    tracing::info!(count = map.len(), "seasons resolved");
    SeasonLookup::ByName(map)
  } else {
    let id = store
      .ensure_default_season()
      .await
      .map_err(write_error(Dimension::Season))?;
    tracing::info!(season_id = id, "no season column; using default season");
    SeasonLookup::Default(id)
  };

  Ok(ResolvedDimensions { countries, viruses, seasons })
}
