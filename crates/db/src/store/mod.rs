//! The job-store seam: one interface, two interchangeable implementations.
//!
//! [`PgJobStore`] is the canonical, durable implementation. [`MemoryJobStore`]
//! is a process-local registry with no persistence guarantee, intended for
//! flows that do not need durability; its entries are evicted by the
//! registry sweeper after a retention window.

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

use vireo_core::generation::GenerationRequest;
use vireo_core::types::{DbId, JobId};

use crate::models::generation::{CompleteJob, GenerationJob, GenerationListQuery};

/// Errors surfaced by a job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database query failed (persisted store only).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence abstraction for generation-job records.
///
/// Transition methods return `true` when a row was actually updated and
/// `false` when the guard matched nothing (missing row or a state that
/// would make the transition regress). Callers rely on this to stay
/// idempotent under duplicate invocation and deletes mid-flight.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Create a pending job owned by `owner_id`.
    async fn create(
        &self,
        owner_id: DbId,
        request: &GenerationRequest,
    ) -> Result<GenerationJob, StoreError>;

    /// Fetch one job by id.
    async fn get(&self, id: JobId) -> Result<Option<GenerationJob>, StoreError>;

    /// List an owner's jobs, newest first.
    async fn list(
        &self,
        owner_id: DbId,
        query: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, StoreError>;

    /// `pending -> processing`.
    async fn mark_processing(&self, id: JobId) -> Result<bool, StoreError>;

    /// `processing -> completed` with artifact URLs and metadata.
    async fn complete(&self, id: JobId, outcome: &CompleteJob) -> Result<bool, StoreError>;

    /// `pending|processing -> failed` with an error message.
    async fn fail(&self, id: JobId, error_message: &str) -> Result<bool, StoreError>;

    /// Remove the record. Returns `false` when it did not exist.
    async fn delete(&self, id: JobId) -> Result<bool, StoreError>;
}
