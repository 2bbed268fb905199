//! Loads an epidemiological CSV snapshot into the epistat relational schema.
//!
//! [`Migrator`] drives one run against any
//! [`StatStore`](epistat_core::store::StatStore); the `epistat-migrate`
//! binary wires it to a [`SqliteStore`](epistat_store_sqlite::SqliteStore).

pub mod dimensions;
pub mod error;
pub mod global;
pub mod loader;
pub mod pipeline;
pub mod settings;
pub mod store;
pub mod validate;
pub mod verify;

pub use error::{ConfigError, MigrationError, Result};
pub use pipeline::{MigrationOutcome, MigrationReport, Migrator};
pub use settings::{DatabaseLocation, MigrateConfig, Overrides};
pub use store::open_store;
