//! Liveness and readiness endpoints.
//!
//! # Endpoints
//! - `GET /health`: always 200 while the process runs; reports mode,
//!   uptime and in-flight request count
//! - `GET /ready`: 200 only in the Listening state, 503 otherwise
//!
//! # Design Decisions
//! - Both endpoints bypass the admission gates so probes are never
//!   rate-limited or asked for an API key
//! - Neither endpoint touches the upstream

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

pub const HEALTH_PATH: &str = "/health";
pub const READY_PATH: &str = "/ready";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub mode: String,
    pub state: String,
    pub uptime_secs: u64,
    pub in_flight: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadyReport {
    pub ready: bool,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReport {
        status: "ok".to_string(),
        mode: state.config.mode.as_str().to_string(),
        state: state.lifecycle.state().as_str().to_string(),
        uptime_secs: state.lifecycle.uptime().as_secs(),
        in_flight: state.in_flight.active(),
    })
}

pub async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.lifecycle.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyReport { ready }))
}
