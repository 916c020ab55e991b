//! Health Check API
//!
//! `/api/health` for monitoring, `/healthz` for liveness probes.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::cache::CacheStats;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" once skills are loaded, otherwise "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// Number of skills in the current snapshot
    pub skills: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_cache: Option<CacheStats>,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let skills = state.service.store().snapshot().map(|s| s.len()).ok();

    Json(HealthResponse {
        status: if skills.is_some() { "ok" } else { "degraded" },
        version: state.version,
        uptime_secs: state.uptime_secs(),
        skills: skills.unwrap_or(0),
        routing_cache: state.service.cache_stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /healthz
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
