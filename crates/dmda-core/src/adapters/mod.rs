//! Data source adapters.

pub mod bigquery;
pub mod fixture;

pub use bigquery::{BigQueryAdapter, BigQueryConfig};
pub use fixture::FixtureSource;
