//! Durable job store backed by the `generation_jobs` table.

use vireo_core::generation::GenerationRequest;
use vireo_core::types::{DbId, JobId};

use crate::models::generation::{CompleteJob, GenerationJob, GenerationListQuery};
use crate::repositories::GenerationRepo;
use crate::store::{JobStore, StoreError};
use crate::DbPool;

/// Canonical [`JobStore`] implementation over Postgres. Records are
/// retained until an explicit delete; nothing expires them.
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl JobStore for PgJobStore {
    async fn create(
        &self,
        owner_id: DbId,
        request: &GenerationRequest,
    ) -> Result<GenerationJob, StoreError> {
        let job = GenerationJob::pending(owner_id, request);
        Ok(GenerationRepo::insert(&self.pool, &job).await?)
    }

    async fn get(&self, id: JobId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list(
        &self,
        owner_id: DbId,
        query: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationRepo::list_by_owner(&self.pool, owner_id, query).await?)
    }

    async fn mark_processing(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(GenerationRepo::mark_processing(&self.pool, id).await?)
    }

    async fn complete(&self, id: JobId, outcome: &CompleteJob) -> Result<bool, StoreError> {
        Ok(GenerationRepo::complete(&self.pool, id, outcome).await?)
    }

    async fn fail(&self, id: JobId, error_message: &str) -> Result<bool, StoreError> {
        Ok(GenerationRepo::fail(&self.pool, id, error_message).await?)
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(GenerationRepo::delete(&self.pool, id).await?)
    }
}
