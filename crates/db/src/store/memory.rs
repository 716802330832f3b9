//! Ephemeral job store: a process-local map with time-boxed retention.
//!
//! Entries survive only as long as the process and are evicted once their
//! age exceeds the retention window (see the registry sweeper in the API
//! crate). Transition guards mirror the SQL guards of the durable store so
//! both implementations observe the same lifecycle.

use std::collections::HashMap;

use tokio::sync::RwLock;
use vireo_core::generation::GenerationRequest;
use vireo_core::types::{DbId, JobId, Timestamp};

use crate::models::generation::{
    CompleteJob, GenerationJob, GenerationListQuery, JobStatus,
};
use crate::store::{JobStore, StoreError};

/// In-memory [`JobStore`] keyed by job id.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete entries created before `cutoff`, bounding memory growth.
    /// Returns the number of evicted entries.
    pub async fn evict_older_than(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        before - jobs.len()
    }

    /// Number of live entries (sweeper logging).
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn create(
        &self,
        owner_id: DbId,
        request: &GenerationRequest,
    ) -> Result<GenerationJob, StoreError> {
        let job = GenerationJob::pending(owner_id, request);
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        owner_id: DbId,
        query: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        let (limit, offset) = query.bounds();

        let mut jobs: Vec<GenerationJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn mark_processing(&self, id: JobId) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status() == JobStatus::Pending => {
                job.status = JobStatus::Processing.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(&self, id: JobId, outcome: &CompleteJob) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status() == JobStatus::Processing => {
                job.status = JobStatus::Completed.as_str().to_string();
                job.artifact_url = Some(outcome.artifact_url.clone());
                job.thumbnail_url = outcome.thumbnail_url.clone();
                job.provider_metadata = Some(outcome.provider_metadata.clone());
                job.completed_at = Some(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, id: JobId, error_message: &str) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if !job.is_terminal() => {
                job.status = JobStatus::Failed.as_str().to_string();
                job.error_message = Some(error_message.to_string());
                job.completed_at = Some(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
