//! Handler for the `/usage` resource: where the caller stands against
//! their plan's ceilings.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use vireo_core::quota::{UsageSnapshot, CAPABILITY_AI_GENERATION, CAPABILITY_VIDEO_RENDER};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Per-capability usage report for the caller.
#[derive(Debug, Serialize)]
pub struct UsageStats {
    pub plan: String,
    pub unlimited: bool,
    pub ai_generation: UsageSnapshot,
    pub video_render: UsageSnapshot,
}

/// GET /api/v1/usage
///
/// Reading a snapshot performs the same lazy period reset as submission,
/// so the numbers shown always reflect the current period.
pub async fn get_usage(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let ai_generation = state
        .quota
        .check_allowed(auth.user_id, CAPABILITY_AI_GENERATION)
        .await
        .map_err(AppError::Core)?;
    let video_render = state
        .quota
        .check_allowed(auth.user_id, CAPABILITY_VIDEO_RENDER)
        .await
        .map_err(AppError::Core)?;

    Ok(Json(DataResponse {
        data: UsageStats {
            plan: ai_generation.plan.clone(),
            unlimited: ai_generation.unlimited && video_render.unlimited,
            ai_generation,
            video_render,
        },
    }))
}
