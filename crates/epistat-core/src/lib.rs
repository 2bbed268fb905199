//! Core types and pure logic for the epistat loader.
//!
//! This crate holds no database dependency. It reads the source CSV, computes
//! checksums, aggregates rows, and defines the [`store::StatStore`] trait that
//! storage backends implement.

pub mod aggregate;
pub mod checksum;
pub mod coerce;
pub mod diagnostic;
pub mod dimension;
pub mod error;
pub mod ledger;
pub mod source;
pub mod stat;
pub mod store;

pub use error::{Error, Result};
