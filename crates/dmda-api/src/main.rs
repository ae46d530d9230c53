use std::sync::Arc;

use clap::Parser;
use dmda_api::cli::Cli;
use dmda_api::server::{self, AppState};
use dmda_api::ApiError;
use dmda_core::SnapshotCache;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(error) = run(Cli::parse()).await {
        tracing::error!(code = error.exit_code(), error = %error, "dmda-api stopped");
        std::process::exit(error.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let query = cli.query_spec()?;
    let source = cli.data_source()?;
    tracing::info!(source = source.id(), table = query.table(), "configured data source");

    let cache = SnapshotCache::new(source, query);
    let shutdown = CancellationToken::new();
    server::watch_signals(shutdown.clone())?;

    // Started before the listener binds so no request can own the build.
    // Shutdown cancels it.
    cache.start_build(shutdown.child_token());

    if cli.wait_for_warmup {
        if let Err(error) = cache.warmup(shutdown.clone()).await {
            tracing::warn!(code = error.code(), "serving without a snapshot");
        }
        if shutdown.is_cancelled() {
            return Ok(());
        }
    }

    let listener = tokio::net::TcpListener::bind(cli.listen_addr()).await?;
    let app = server::router(Arc::new(AppState {
        cache,
        warmup_timeout: cli.warmup_timeout(),
    }));

    server::serve(listener, app, shutdown, cli.shutdown_grace()).await
}
