//! HTTP server and handlers for the snapshot cache.
//!
//! | Route | Methods | Description |
//! |-------|---------|-------------|
//! | `/warmup` | GET, POST | Wait for the build (bounded) and report the outcome |
//! | `/data/curated` | GET, POST | Current snapshot as a JSON array |
//! | `/status` | GET | Build state without waiting |
//!
//! Every route carries permissive-origin CORS headers, and `OPTIONS`
//! preflight requests are answered directly with 200.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use dmda_core::{BuildState, SnapshotCache, WarmupError};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;

const LOG_TARGET: &str = "dmda::http";

/// Application state shared across handlers.
pub struct AppState {
    pub cache: SnapshotCache,
    /// Upper bound on how long a `/warmup` request waits for the build. An
    /// expired wait does not cancel the build.
    pub warmup_timeout: Duration,
}

/// Body of every `/warmup` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupPayload {
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl WarmupPayload {
    fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: OffsetDateTime::now_utc(),
        }
    }
}

/// Body of `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: String,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/warmup", get(warmup_handler).post(warmup_handler))
        .route("/data/curated", get(data_handler).post(data_handler))
        .route("/status", get(status_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

async fn warmup_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<WarmupPayload>) {
    tracing::info!(target: LOG_TARGET, "warmup request received");

    let (status, message) = match state.cache.join_within(state.warmup_timeout).await {
        Ok(_) => (StatusCode::OK, String::from("warmup request processed")),
        Err(error @ WarmupError::TimedOut(_)) => (StatusCode::GATEWAY_TIMEOUT, error.to_string()),
        Err(error) => (StatusCode::SERVICE_UNAVAILABLE, error.to_string()),
    };

    (status, Json(WarmupPayload::now(message)))
}

async fn data_handler(State(state): State<Arc<AppState>>) -> Response {
    let rows = state.cache.snapshot().await;
    match serde_json::to_vec(rows.as_slice()) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(error) => {
            tracing::error!(target: LOG_TARGET, error = %error, "cache error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusPayload> {
    let status = state.cache.status();
    let payload = match &status {
        BuildState::Ready(summary) => StatusPayload {
            state: status.as_str().to_owned(),
            rows: summary.rows,
            elapsed_ms: Some(summary.elapsed.as_millis() as u64),
            error: None,
        },
        BuildState::Failed(error) => StatusPayload {
            state: status.as_str().to_owned(),
            rows: 0,
            elapsed_ms: None,
            error: Some(error.to_string()),
        },
        BuildState::Idle | BuildState::Building => StatusPayload {
            state: status.as_str().to_owned(),
            rows: 0,
            elapsed_ms: None,
            error: None,
        },
    };
    Json(payload)
}

/// Serves `app` until `shutdown` fires, then drains in-flight requests for at
/// most `grace`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<(), ApiError> {
    let addr = listener.local_addr()?;
    tracing::info!(target: LOG_TARGET, %addr, "listening for HTTP");

    let drain = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return flatten(joined),
        _ = shutdown.cancelled() => {}
    }

    tracing::info!(
        target: LOG_TARGET,
        grace_ms = grace.as_millis() as u64,
        "initiating graceful shutdown"
    );
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!(target: LOG_TARGET, "grace period elapsed with requests in flight");
            Ok(())
        }
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), ApiError> {
    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(error) => Err(ApiError::Server(format!("server task failed: {error}"))),
    }
}

/// Cancels `shutdown` on SIGINT or SIGTERM. SIGHUP is logged and ignored.
pub fn watch_signals(shutdown: CancellationToken) -> Result<JoinHandle<()>, ApiError> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sighup.recv() => {
                    tracing::info!(target: LOG_TARGET, signal = "SIGHUP", "signal received; ignoring");
                    continue;
                }
                _ = shutdown.cancelled() => return,
            };
            tracing::info!(target: LOG_TARGET, signal = name, "signal received");
            shutdown.cancel();
            return;
        }
    }))
}
