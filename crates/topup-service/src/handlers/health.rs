//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// `"warm"` once an exchange-rate snapshot is held, `"cold"` before.
    pub rates: &'static str,
    /// Source update time of the held snapshot, in unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates_last_update: Option<u64>,
}

/// Health check endpoint.
///
/// Reads only in-process state; a cold rate cache does not fail the check.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.rates.current();

    Json(HealthResponse {
        status: "ok".to_string(),
        service: "topup".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rates: if snapshot.is_some() { "warm" } else { "cold" },
        rates_last_update: snapshot.map(|s| s.last_update),
    })
}
