//! Command-line and environment configuration for the dmda service.
//!
//! Every option can be set with a flag or its environment variable.
//!
//! | Option | Env | Default | Description |
//! |--------|-----|---------|-------------|
//! | `--port` | `PORT` | `8080` | Listen port |
//! | `--source` | `DMDA_SOURCE` | `bigquery` | Data source (`bigquery`, `fixture`) |
//! | `--project-id` | `DMDA_PROJECT_ID` | | BigQuery billing project |
//! | `--table` | `DMDA_TABLE` | curated salaries table | Fully qualified table |
//! | `--columns` | `DMDA_COLUMNS` | all | Comma-separated projection |
//! | `--bigquery-token` | `DMDA_BIGQUERY_TOKEN` | | OAuth access token |
//! | `--bigquery-base-url` | `DMDA_BIGQUERY_BASE_URL` | public endpoint | REST base URL |
//! | `--page-size` | `DMDA_PAGE_SIZE` | `10000` | Rows per result page |
//! | `--request-timeout-ms` | `DMDA_REQUEST_TIMEOUT_MS` | `30000` | Per-request timeout |
//! | `--fixture-path` | `DMDA_FIXTURE_PATH` | | JSON array of records |
//! | `--warmup-timeout-secs` | `DMDA_WARMUP_TIMEOUT_SECS` | `60` | Bound on `/warmup` waits |
//! | `--shutdown-grace-secs` | `DMDA_SHUTDOWN_GRACE_SECS` | `5` | Graceful shutdown budget |
//! | `--wait-for-warmup` | `DMDA_WAIT_FOR_WARMUP` | `false` | Serve only after the build resolves |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use dmda_core::adapters::bigquery::DEFAULT_BASE_URL;
use dmda_core::{
    BigQueryAdapter, BigQueryConfig, Column, DataSource, FixtureSource, HttpAuth, QuerySpec,
    ReqwestHttpClient, DEFAULT_TABLE,
};

use crate::error::ApiError;

/// Snapshot cache service for the curated data science salaries table.
#[derive(Debug, Clone, Parser)]
#[command(name = "dmda-api", version, about)]
pub struct Cli {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "DMDA_SOURCE", value_enum, default_value_t = SourceKind::Bigquery)]
    pub source: SourceKind,

    #[arg(long, env = "DMDA_PROJECT_ID")]
    pub project_id: Option<String>,

    #[arg(long, env = "DMDA_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    #[arg(long, env = "DMDA_COLUMNS", value_delimiter = ',')]
    pub columns: Vec<Column>,

    #[arg(long, env = "DMDA_BIGQUERY_TOKEN", hide_env_values = true)]
    pub bigquery_token: Option<String>,

    #[arg(long, env = "DMDA_BIGQUERY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub bigquery_base_url: String,

    #[arg(long, env = "DMDA_PAGE_SIZE", default_value_t = 10_000)]
    pub page_size: u32,

    #[arg(long, env = "DMDA_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "DMDA_FIXTURE_PATH")]
    pub fixture_path: Option<PathBuf>,

    #[arg(long, env = "DMDA_WARMUP_TIMEOUT_SECS", default_value_t = 60)]
    pub warmup_timeout_secs: u64,

    #[arg(long, env = "DMDA_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    #[arg(long, env = "DMDA_WAIT_FOR_WARMUP")]
    pub wait_for_warmup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Bigquery,
    Fixture,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_secs(self.warmup_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Query built from `--table` and `--columns`. No columns means all.
    pub fn query_spec(&self) -> Result<QuerySpec, ApiError> {
        let spec = if self.columns.is_empty() {
            QuerySpec::all_columns(self.table.as_str())?
        } else {
            QuerySpec::new(self.table.as_str(), self.columns.clone())?
        };
        Ok(spec)
    }

    pub fn data_source(&self) -> Result<Arc<dyn DataSource>, ApiError> {
        match self.source {
            SourceKind::Bigquery => self.bigquery_source(),
            SourceKind::Fixture => {
                let path = self.fixture_path.as_ref().ok_or_else(|| {
                    ApiError::Config(String::from(
                        "DMDA_FIXTURE_PATH is required when DMDA_SOURCE=fixture",
                    ))
                })?;
                Ok(Arc::new(FixtureSource::from_json_file(path)?))
            }
        }
    }

    fn bigquery_source(&self) -> Result<Arc<dyn DataSource>, ApiError> {
        let project_id = self.project_id.as_deref().ok_or_else(|| {
            ApiError::Config(String::from(
                "DMDA_PROJECT_ID is required when DMDA_SOURCE=bigquery",
            ))
        })?;

        let mut config = BigQueryConfig::new(project_id)?;
        config.base_url = self.bigquery_base_url.clone();
        config.page_size = self.page_size;
        config.request_timeout_ms = self.request_timeout_ms;

        let auth = match self.bigquery_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => HttpAuth::BearerToken(token.to_owned()),
            _ => {
                tracing::warn!("no BigQuery access token configured; requests are unauthenticated");
                HttpAuth::None
            }
        };

        let adapter = BigQueryAdapter::new(config, Arc::new(ReqwestHttpClient::new()), auth)?;
        Ok(Arc::new(adapter))
    }
}
