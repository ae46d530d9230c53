//! Core contracts for dmda.
//!
//! This crate contains:
//! - The curated salary record and the query that selects it
//! - The data source contract and its BigQuery and fixture adapters
//! - The snapshot cache: store, build coordinator, and warmup gate

pub mod adapters;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
mod observability;
pub mod snapshot;

pub use adapters::{BigQueryAdapter, BigQueryConfig, FixtureSource};
pub use data_source::{DataSource, RowCursor, SourceError, SourceErrorKind};
pub use domain::{Column, QuerySpec, Record, DEFAULT_TABLE};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};
pub use snapshot::{
    BuildCoordinator, BuildPromise, BuildState, BuildSummary, SnapshotCache, SnapshotStore,
    WarmupError, WarmupGate,
};
