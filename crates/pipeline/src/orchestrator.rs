//! Per-job state machine.
//!
//! One orchestrator instance is shared by all job tasks, but each job is
//! mutated only by the single task spawned for it. [`Orchestrator::process`]
//! never returns an error and never panics on a job's behalf: every failure
//! past acceptance lands on the job row as `failed` + `error_message`, and
//! the caller only learns about it by polling status.

use std::sync::Arc;

use vireo_core::quota::{QuotaGuard, CAPABILITY_AI_GENERATION};
use vireo_core::types::JobId;
use vireo_db::models::generation::{CompleteJob, GenerationJob};
use vireo_db::store::JobStore;
use vireo_provider::{GenerationBackend, ProviderError};

use crate::materializer::{MaterializeError, Materializer};
use crate::poll::{poll_until_complete, PollError, PollPolicy};

/// Everything that can go wrong between submission and completion.
#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

impl JobError {
    /// Whether the backing job record vanished mid-flight; there is
    /// nothing left to write a failure onto.
    fn is_abandoned(&self) -> bool {
        matches!(self, JobError::Poll(PollError::Aborted))
    }
}

/// Drives a single generation job from `pending` to a terminal state.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn GenerationBackend>,
    materializer: Materializer,
    quota: Arc<dyn QuotaGuard>,
    policy: PollPolicy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn GenerationBackend>,
        materializer: Materializer,
        quota: Arc<dyn QuotaGuard>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            store,
            backend,
            materializer,
            quota,
            policy,
        }
    }

    /// Drive `job_id` to a terminal state.
    ///
    /// Safe to invoke more than once for the same job: a terminal or
    /// already-processing record is left untouched.
    pub async fn process(&self, job_id: JobId) {
        let job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::info!(%job_id, "Job gone before processing started");
                return;
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to load job");
                return;
            }
        };

        if job.is_terminal() {
            tracing::debug!(%job_id, status = %job.status, "Job already terminal, nothing to do");
            return;
        }

        match self.store.mark_processing(job_id).await {
            Ok(true) => {}
            Ok(false) => {
                // Deleted or claimed since the read above.
                tracing::info!(%job_id, "Job not in pending state anymore, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to mark job processing");
                return;
            }
        }

        match self.run(&job).await {
            Ok(outcome) => self.finish_success(&job, outcome).await,
            Err(err) if err.is_abandoned() => {
                tracing::info!(%job_id, "Job deleted mid-flight; abandoning its operation");
            }
            Err(err) => self.finish_failure(job_id, err).await,
        }
    }

    /// Happy path: submit, poll to completion, materialize.
    async fn run(&self, job: &GenerationJob) -> Result<CompleteJob, JobError> {
        let request = job.request();
        let job_id = job.id;

        let handle = self.backend.submit(&request).await?;
        tracing::info!(
            %job_id,
            operation = %handle.name,
            model = %request.model,
            "Generation submitted to provider",
        );

        let store = Arc::clone(&self.store);
        let artifact = poll_until_complete(self.backend.as_ref(), &handle, &self.policy, || {
            let store = Arc::clone(&store);
            async move { matches!(store.get(job_id).await, Ok(None)) }
        })
        .await?;

        let materialized = self.materializer.materialize(job_id, &artifact).await?;

        Ok(CompleteJob {
            artifact_url: materialized.artifact_url,
            thumbnail_url: materialized.thumbnail_url,
            provider_metadata: materialized.metadata,
        })
    }

    async fn finish_success(&self, job: &GenerationJob, outcome: CompleteJob) {
        match self.store.complete(job.id, &outcome).await {
            Ok(true) => {
                tracing::info!(job_id = %job.id, "Generation completed");
                // Usage is recorded only after the completed transition
                // persists; a crash in between under-counts, never the
                // other way around.
                if let Err(e) = self
                    .quota
                    .record_usage(job.owner_id, CAPABILITY_AI_GENERATION)
                    .await
                {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to record usage");
                }
            }
            Ok(false) => {
                tracing::warn!(
                    job_id = %job.id,
                    "Completed transition matched no row (deleted mid-flight?); usage not recorded",
                );
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to persist completion");
            }
        }
    }

    async fn finish_failure(&self, job_id: JobId, err: JobError) {
        let message = err.to_string();
        tracing::warn!(%job_id, error = %message, "Generation failed");

        match self.store.fail(job_id, &message).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(%job_id, "Failed transition matched no row (job gone or terminal)");
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to persist job failure");
            }
        }
    }
}
