//! Repository for the `generation_jobs` table.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so the
//! monotonic lifecycle holds even if an update is issued twice: a second
//! terminal write matches zero rows and reports `false` to the caller.

use sqlx::PgPool;
use vireo_core::types::{DbId, JobId};

use crate::models::generation::{
    CompleteJob, GenerationJob, GenerationListQuery, JobStatus,
};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, prompt, model, duration_secs, aspect_ratio, \
    reference_image_url, status, artifact_url, thumbnail_url, \
    error_message, provider_metadata, created_at, completed_at";

/// Provides CRUD operations for generation jobs.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a freshly constructed pending job and return the stored row.
    pub async fn insert(pool: &PgPool, job: &GenerationJob) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs \
                 (id, owner_id, prompt, model, duration_secs, aspect_ratio, \
                  reference_image_url, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(job.id)
            .bind(job.owner_id)
            .bind(&job.prompt)
            .bind(&job.model)
            .bind(job.duration_secs)
            .bind(&job.aspect_ratio)
            .bind(&job.reference_image_url)
            .bind(&job.status)
            .bind(job.created_at)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's jobs, newest first, with pagination.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        params: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let (limit, offset) = params.bounds();
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Transition a pending job to `processing`.
    ///
    /// Returns `false` when the job is missing or already past `pending`.
    pub async fn mark_processing(pool: &PgPool, id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs SET status = $2 WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .bind(JobStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a processing job to `completed` with its artifact URLs
    /// and provider metadata. Returns `false` when the job is missing or
    /// not in `processing`.
    pub async fn complete(
        pool: &PgPool,
        id: JobId,
        outcome: &CompleteJob,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status = $2, artifact_url = $3, thumbnail_url = $4, \
                 provider_metadata = $5, completed_at = NOW() \
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(JobStatus::Completed.as_str())
        .bind(&outcome.artifact_url)
        .bind(&outcome.thumbnail_url)
        .bind(&outcome.provider_metadata)
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a non-terminal job to `failed` with a human-readable
    /// error message. Returns `false` when the job is missing or already
    /// terminal.
    pub async fn fail(pool: &PgPool, id: JobId, error_message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a job row. Returns `false` when no row existed.
    pub async fn delete(pool: &PgPool, id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generation_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
