//! Task handoff for accepted jobs.
//!
//! Submission handlers never await generation work. They hand the job id
//! to [`JobRunner`], which spawns one tracked Tokio task per job. The
//! tracker gives shutdown a drain point, and the orchestrator inside the
//! task owns the error boundary, so no job failure can escape into the
//! host process.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vireo_core::types::JobId;

use crate::orchestrator::Orchestrator;

/// Spawns and tracks one background task per accepted job.
pub struct JobRunner {
    orchestrator: Arc<Orchestrator>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Hand a freshly accepted job to the background pipeline.
    ///
    /// Returns immediately; the caller must already have persisted the job
    /// row so status queries can observe it before the first transition.
    /// During shutdown new work is refused and the job stays `pending`.
    pub fn dispatch(&self, job_id: JobId) {
        if self.cancel.is_cancelled() {
            tracing::warn!(%job_id, "Runner is shutting down; job left pending");
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        self.tracker.spawn(async move {
            orchestrator.process(job_id).await;
        });

        tracing::debug!(%job_id, in_flight = self.tracker.len(), "Job dispatched");
    }

    /// Number of generation tasks currently tracked.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait up to `timeout` for in-flight jobs.
    ///
    /// Poll loops are wall-clock bounded rather than cancelled, so a job
    /// mid-poll may outlive the timeout; it is logged and abandoned to the
    /// process exit.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        self.tracker.close();

        let in_flight = self.tracker.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Draining generation tasks");
        }

        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                in_flight = self.tracker.len(),
                "Generation tasks still in flight after drain timeout",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vireo_core::error::CoreError;
    use vireo_core::generation::GenerationRequest;
    use vireo_core::quota::{QuotaGuard, UsageSnapshot};
    use vireo_core::types::DbId;
    use vireo_db::models::generation::JobStatus;
    use vireo_db::store::{JobStore, MemoryJobStore};
    use vireo_provider::{GenerationBackend, OperationHandle, OperationStatus, ProviderError};

    use crate::materializer::Materializer;
    use crate::poll::PollPolicy;

    /// Backend that fails every submission, so no materialization (and no
    /// network) is needed to reach a terminal state.
    struct RejectingBackend;

    #[async_trait::async_trait]
    impl GenerationBackend for RejectingBackend {
        async fn submit(
            &self,
            _request: &GenerationRequest,
        ) -> Result<OperationHandle, ProviderError> {
            Err(ProviderError::Api {
                status: 500,
                body: "provider down".to_string(),
            })
        }

        async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
            unreachable!("submit never succeeds")
        }
    }

    struct NoQuota;

    #[async_trait::async_trait]
    impl QuotaGuard for NoQuota {
        async fn check_allowed(
            &self,
            _owner: DbId,
            _capability: &str,
        ) -> Result<UsageSnapshot, CoreError> {
            Ok(UsageSnapshot::unlimited("pro".to_string()))
        }

        async fn record_usage(&self, _owner: DbId, _capability: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct NoStorage;

    #[async_trait::async_trait]
    impl vireo_storage::ObjectStorage for NoStorage {
        async fn upload_video(
            &self,
            _local_path: &std::path::Path,
            _public_id: &str,
        ) -> Result<vireo_storage::StoredArtifact, vireo_storage::StorageError> {
            unreachable!("never reached in these tests")
        }

        async fn derive_thumbnail(
            &self,
            _public_id: &str,
            _offset_secs: u32,
        ) -> Result<String, vireo_storage::StorageError> {
            unreachable!("never reached in these tests")
        }

        async fn delete(
            &self,
            _public_id: &str,
            _resource_type: &str,
        ) -> Result<(), vireo_storage::StorageError> {
            Ok(())
        }
    }

    fn runner(store: Arc<MemoryJobStore>, spool: &tempfile::TempDir) -> JobRunner {
        let orchestrator = Orchestrator::new(
            store as Arc<dyn JobStore>,
            Arc::new(RejectingBackend),
            Materializer::new(Arc::new(NoStorage), spool.path().to_path_buf()),
            Arc::new(NoQuota),
            PollPolicy::default(),
        );
        JobRunner::new(Arc::new(orchestrator))
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "test".to_string(),
            model: vireo_core::generation::MODEL_STANDARD.to_string(),
            duration_secs: 8,
            aspect_ratio: "16:9".to_string(),
            reference_image_url: None,
        }
    }

    #[tokio::test]
    async fn dispatched_job_reaches_a_terminal_state() {
        let store = Arc::new(MemoryJobStore::new());
        let spool = tempfile::tempdir().unwrap();
        let runner = runner(Arc::clone(&store), &spool);

        let job = store.create(1, &request()).await.unwrap();
        runner.dispatch(job.id);
        runner.shutdown(Duration::from_secs(5)).await;

        let finished = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(finished.status(), JobStatus::Failed);
        assert!(finished.error_message.is_some());
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_leaves_job_pending() {
        let store = Arc::new(MemoryJobStore::new());
        let spool = tempfile::tempdir().unwrap();
        let runner = runner(Arc::clone(&store), &spool);

        runner.shutdown(Duration::from_secs(1)).await;

        let job = store.create(1, &request()).await.unwrap();
        runner.dispatch(job.id);

        let untouched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(untouched.status(), JobStatus::Pending);
    }
}
