//! Skill listing and hot reload

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::skills::{RejectedFile, SkillCandidate};

#[derive(Debug, Serialize)]
pub struct SkillListResponse {
    pub skills: Vec<SkillCandidate>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub loaded: usize,
    pub skill_ids: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

/// GET /api/skills - metadata only, never bodies
pub async fn list_skills(State(state): State<Arc<AppState>>) -> Result<Json<SkillListResponse>, ApiError> {
    let skills = state.service.list_skills()?;
    Ok(Json(SkillListResponse {
        total: skills.len(),
        skills,
    }))
}

/// POST /api/skills/reload
///
/// The previous snapshot keeps serving if the reload fails.
pub async fn reload_skills(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let report = state.service.reload().await?;
    info!(
        "Skills reloaded over HTTP: {} loaded, {} rejected",
        report.loaded.len(),
        report.rejected.len()
    );

    Ok(Json(ReloadResponse {
        loaded: report.loaded.len(),
        skill_ids: report.loaded,
        rejected: report.rejected,
    }))
}
