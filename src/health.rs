//! HTTP health endpoint for the daemon
//!
//! `GET /health` reports the outcome of the most recent cycle. The endpoint
//! answers 200 while no cycle has failed yet and 503 after a failed cycle.

use crate::model::CrawlResult;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Health snapshot returned by `GET /health`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub uptime_secs: u64,
    pub cycles_completed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle_success: Option<bool>,
    pub last_error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.last_cycle_success != Some(false)
    }
}

#[derive(Debug, Default)]
struct CycleRecord {
    completed: u64,
    last_at: Option<DateTime<Utc>>,
    last_success: Option<bool>,
    last_error: Option<String>,
}

/// Shared state updated by the scheduler and read by the endpoint
#[derive(Debug)]
pub struct HealthState {
    started: Instant,
    record: Mutex<CycleRecord>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            record: Mutex::new(CycleRecord::default()),
        }
    }

    /// Records the outcome of a finished cycle
    pub fn record(&self, result: &CrawlResult) {
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.completed += 1;
        record.last_at = Some(result.timestamp);
        record.last_success = Some(result.success);
        record.last_error = result.errors.last().cloned();
    }

    pub fn report(&self) -> HealthReport {
        let record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        let status = match record.last_success {
            None => "starting",
            Some(true) => "ok",
            Some(false) => "failing",
        };

        HealthReport {
            status: status.to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            cycles_completed: record.completed,
            last_cycle_at: record.last_at,
            last_cycle_success: record.last_success,
            last_error: record.last_error.clone(),
        }
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.report();
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

/// Builds the router serving `/health`
pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Binds `bind` and serves the health endpoint until `shutdown` flips to true
pub async fn serve(
    bind: SocketAddr,
    state: Arc<HealthState>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    serve_on(listener, state, shutdown).await
}

/// Serves the health endpoint on an already bound listener
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    tracing::info!("Health endpoint listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("Health endpoint stopped");
    Ok(())
}
