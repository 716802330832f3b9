//! Handlers for the `/generations` resource.
//!
//! Routes:
//! - `POST   /generations`       -- submit a generation job (202 Accepted)
//! - `GET    /generations`       -- list the caller's jobs, newest first
//! - `GET    /generations/{id}`  -- full job snapshot
//! - `DELETE /generations/{id}`  -- delete job + best-effort artifact cleanup
//!
//! Submission is accepted-not-final: the job row is persisted and visible
//! to status reads before the background pipeline receives it, and the
//! caller learns about completion or failure only by polling.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use vireo_core::error::CoreError;
use vireo_core::generation::{
    self, GenerationRequest, DEFAULT_ASPECT_RATIO, DEFAULT_DURATION_SECS,
};
use vireo_core::quota::CAPABILITY_AI_GENERATION;
use vireo_core::types::JobId;
use vireo_db::models::generation::{GenerationJob, GenerationListQuery};
use vireo_storage::{RESOURCE_IMAGE, RESOURCE_VIDEO};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Body for `POST /generations`.
#[derive(Debug, Deserialize)]
pub struct SubmitGenerationRequest {
    pub prompt: String,
    pub model: String,
    pub duration_secs: Option<i32>,
    pub aspect_ratio: Option<String>,
    pub reference_image_url: Option<String>,
}

/// Immediate acknowledgment for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitGenerationResponse {
    pub id: JobId,
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID and verify the caller owns it.
///
/// Returns `NotFound` if the job does not exist and `Forbidden` if the
/// caller is not the owner. `action` is used in the error message
/// (e.g. "view", "delete").
async fn find_and_authorize(
    state: &AppState,
    job_id: JobId,
    auth: &AuthUser,
    action: &str,
) -> AppResult<GenerationJob> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id: job_id.to_string(),
        }))?;

    if job.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Cannot {action} another user's generation"
        ))));
    }

    Ok(job)
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Validates the request, checks the caller's quota, persists a pending
/// job, and hands it to the background pipeline. Responds 202 with the
/// job id; 400 on validation failure; 429 with a usage snapshot when the
/// quota is exhausted (no job is created in either failure case).
pub async fn submit_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let request = GenerationRequest {
        prompt: input.prompt.trim().to_string(),
        model: input.model,
        duration_secs: input.duration_secs.unwrap_or(DEFAULT_DURATION_SECS),
        aspect_ratio: input
            .aspect_ratio
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
        reference_image_url: input.reference_image_url,
    };
    generation::validate_request(&request).map_err(AppError::Core)?;

    let snapshot = state
        .quota
        .check_allowed(auth.user_id, CAPABILITY_AI_GENERATION)
        .await
        .map_err(AppError::Core)?;
    if !snapshot.allowed {
        return Err(AppError::Core(CoreError::QuotaExceeded(snapshot)));
    }

    // The row must be durably visible to status reads before the pipeline
    // performs its first transition, so dispatch strictly follows create.
    let job = state.store.create(auth.user_id, &request).await?;
    state.runner.dispatch(job.id);

    tracing::info!(
        job_id = %job.id,
        user_id = auth.user_id,
        model = %job.model,
        "Generation accepted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmitGenerationResponse {
                id: job.id,
                status: "pending",
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/generations
///
/// List the caller's jobs, newest first. Supports `limit` and `offset`
/// query parameters.
pub async fn list_generations(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<GenerationListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.store.list(auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/generations/{id}
///
/// Full snapshot of a single job. Callers can only view their own jobs.
pub async fn get_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state, job_id, &auth, "view").await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/generations/{id}
///
/// Removes the job record and best-effort deletes its durable artifacts.
/// Storage failures are logged, never surfaced: the record delete wins.
pub async fn delete_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state, job_id, &auth, "delete").await?;

    delete_artifacts(&state, &job).await;
    state.store.delete(job.id).await?;

    tracing::info!(job_id = %job.id, user_id = auth.user_id, "Generation deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Best-effort removal of everything the job references in durable
/// storage. The thumbnail is a derived rendition of the video's public id
/// and is removed with it.
async fn delete_artifacts(state: &AppState, job: &GenerationJob) {
    if let Some(public_id) = job
        .artifact_url
        .as_deref()
        .and_then(generation::extract_public_id)
    {
        if let Err(e) = state.storage.delete(&public_id, RESOURCE_VIDEO).await {
            tracing::warn!(
                job_id = %job.id,
                public_id = %public_id,
                error = %e,
                "Failed to delete stored artifact (record delete proceeds)",
            );
        }
    }

    if let Some(public_id) = job
        .reference_image_url
        .as_deref()
        .and_then(generation::extract_public_id)
    {
        if let Err(e) = state.storage.delete(&public_id, RESOURCE_IMAGE).await {
            tracing::warn!(
                job_id = %job.id,
                public_id = %public_id,
                error = %e,
                "Failed to delete reference asset (record delete proceeds)",
            );
        }
    }
}
