//! API handlers for the scan command surface.
//!
//! All handlers return `Response` via [`ApiResponse::ok`] or [`ApiErrorResponse`].

use std::time::Instant;

use axum::extract::{OriginalUri, State};
use axum::response::Response;
use serde::Serialize;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::event_log::LogEntry;
use crate::pipeline::{AcquisitionStats, ScanHandle, Transition};
use crate::scan::Phase;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub handle: ScanHandle,
    /// Name of the active line source (e.g. "serial:COM10")
    pub source_name: String,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(handle: ScanHandle, source_name: impl Into<String>) -> Self {
        Self {
            handle,
            source_name: source_name.into(),
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: Phase,
    pub baseline_len: usize,
    pub live_len: usize,
    pub expected_readings: usize,
    pub sensor_step_cm: u32,
    pub deviation_threshold_cm: f64,
    pub source: String,
    pub acquisition: AcquisitionStats,
    pub log_entries: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub phase: Phase,
    /// False when the command was accepted but changed nothing
    pub changed: bool,
}

impl From<Transition> for CommandResponse {
    fn from(t: Transition) -> Self {
        Self {
            phase: t.phase,
            changed: t.changed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub count: usize,
    pub entries: Vec<LogEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> Response {
    let scan = state.handle.status();
    ApiResponse::ok(StatusResponse {
        phase: scan.phase,
        baseline_len: scan.baseline_len,
        live_len: scan.live_len,
        expected_readings: scan.settings.expected_readings(),
        sensor_step_cm: scan.settings.sensor_step_cm,
        deviation_threshold_cm: scan.settings.deviation_threshold_cm,
        source: state.source_name.clone(),
        acquisition: state.handle.stats(),
        log_entries: state.handle.log().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /snapshot
pub async fn snapshot(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.handle.snapshot())
}

/// POST /learning/start
pub async fn start_learning(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(CommandResponse {
        phase: state.handle.start_learning(),
        changed: true,
    })
}

/// POST /learning/end
pub async fn end_learning(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(CommandResponse::from(state.handle.end_learning()))
}

/// POST /analysis/start
pub async fn start_analysis(State(state): State<ApiState>) -> Response {
    match state.handle.start_analysis() {
        Ok(phase) => ApiResponse::ok(CommandResponse {
            phase,
            changed: true,
        }),
        Err(e) => ApiErrorResponse::precondition_failed(e.to_string()),
    }
}

/// GET /log
pub async fn get_log(State(state): State<ApiState>) -> Response {
    let entries = state.handle.get_log();
    ApiResponse::ok(LogResponse {
        count: entries.len(),
        entries,
    })
}

/// DELETE /log
pub async fn clear_log(State(state): State<ApiState>) -> Response {
    state.handle.clear_log();
    ApiResponse::ok(LogResponse {
        count: 0,
        entries: Vec::new(),
    })
}

/// Fallback for paths outside the route table.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    ApiErrorResponse::not_found(format!("No route for {}", uri.path()))
}
