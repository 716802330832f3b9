//! Generation-job entity, status constants, and job DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::generation::GenerationRequest;
use vireo_core::types::{DbId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
///
/// Transitions are strictly monotonic: `pending -> processing -> completed`
/// or `pending -> processing -> failed`. Stored as TEXT; the table carries a
/// CHECK constraint over the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Database/text representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the text representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status ends the job's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `generation_jobs` table (or its in-memory equivalent).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub owner_id: DbId,
    pub prompt: String,
    pub model: String,
    pub duration_secs: i32,
    pub aspect_ratio: String,
    pub reference_image_url: Option<String>,
    pub status: String,
    pub artifact_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl GenerationJob {
    /// Build a fresh pending job for `owner` from validated request
    /// parameters. Both store implementations create rows through this
    /// constructor so ids and timestamps are assigned identically.
    pub fn pending(owner_id: DbId, request: &GenerationRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            owner_id,
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            duration_secs: request.duration_secs,
            aspect_ratio: request.aspect_ratio.clone(),
            reference_image_url: request.reference_image_url.clone(),
            status: JobStatus::Pending.as_str().to_string(),
            artifact_url: None,
            thumbnail_url: None,
            error_message: None,
            provider_metadata: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Typed view of the status column. Unknown text (which the CHECK
    /// constraint prevents) reads as failed.
    pub fn status(&self) -> JobStatus {
        JobStatus::parse(&self.status).unwrap_or(JobStatus::Failed)
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Reconstruct the validated request parameters from the row.
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            model: self.model.clone(),
            duration_secs: self.duration_secs,
            aspect_ratio: self.aspect_ratio.clone(),
            reference_image_url: self.reference_image_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Completion payload written when a job's artifact has been materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteJob {
    /// Permanent artifact URL in durable storage.
    pub artifact_url: String,
    /// Derived still-frame thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Provider-reported attributes (bytes, format, dimensions, duration).
    pub provider_metadata: serde_json::Value,
}

/// Query parameters for listing an owner's jobs.
#[derive(Debug, Default, Deserialize)]
pub struct GenerationListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

impl GenerationListQuery {
    /// Effective `(limit, offset)` after applying defaults and caps.
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn list_bounds_apply_defaults_and_caps() {
        assert_eq!(GenerationListQuery::default().bounds(), (DEFAULT_LIMIT, 0));

        let query = GenerationListQuery {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(query.bounds(), (MAX_LIMIT, 0));
    }
}
