//! Bounded polling combinator for provider operations.
//!
//! The provider's long-poll contract is "sleep a fixed interval, ask
//! again" up to a hard attempt ceiling. [`poll_until_complete`] owns that
//! loop: it sleeps cooperatively, consults an abort hook each round so a
//! deleted job stops its background work, and converts the exhausted
//! bound into a timeout error instead of leaving the job in limbo.

use std::future::Future;
use std::time::Duration;

use vireo_core::generation::{MAX_POLL_ATTEMPTS, POLL_INTERVAL_SECS};
use vireo_provider::{ArtifactRef, GenerationBackend, OperationHandle, ProviderError};

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Sleep between consecutive polls.
    pub interval: Duration,
    /// Hard ceiling on poll attempts before the job is timed out.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

/// Terminal outcomes of the poll loop other than a usable artifact.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The attempt ceiling was reached without the operation completing.
    #[error("Generation timed out after {0} polling attempts")]
    TimedOut(u32),

    /// The operation completed but yielded no artifact reference.
    #[error("Generation completed but no artifact was produced")]
    NoArtifact,

    /// The abort hook fired (the backing job record is gone).
    #[error("Job record disappeared while polling; abandoning operation")]
    Aborted,

    /// The provider failed a poll request.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Poll `handle` until the operation completes, the policy's attempt bound
/// is exhausted, or `should_abort` reports that the backing job record no
/// longer exists.
///
/// Each round sleeps `policy.interval` first, mirroring the provider's
/// guidance that a freshly queued operation is never done immediately.
pub async fn poll_until_complete<F, Fut>(
    backend: &dyn GenerationBackend,
    handle: &OperationHandle,
    policy: &PollPolicy,
    mut should_abort: F,
) -> Result<ArtifactRef, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        if should_abort().await {
            return Err(PollError::Aborted);
        }

        let status = backend.poll(handle).await?;
        if status.done {
            return status.artifact.ok_or(PollError::NoArtifact);
        }

        tracing::debug!(
            operation = %handle.name,
            attempt,
            max_attempts = policy.max_attempts,
            "Operation still running",
        );
    }

    Err(PollError::TimedOut(policy.max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use vireo_provider::OperationStatus;

    /// Backend whose operation completes after a fixed number of polls.
    struct ScriptedBackend {
        completes_after: Option<u32>,
        with_artifact: bool,
        polls: AtomicU32,
    }

    impl ScriptedBackend {
        fn completing_after(polls: u32) -> Self {
            Self {
                completes_after: Some(polls),
                with_artifact: true,
                polls: AtomicU32::new(0),
            }
        }

        fn never_completing() -> Self {
            Self {
                completes_after: None,
                with_artifact: true,
                polls: AtomicU32::new(0),
            }
        }

        fn completing_empty() -> Self {
            Self {
                completes_after: Some(1),
                with_artifact: false,
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn submit(
            &self,
            _request: &vireo_core::generation::GenerationRequest,
        ) -> Result<OperationHandle, ProviderError> {
            Ok(OperationHandle::new("operations/test"))
        }

        async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
            let seen = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let done = self.completes_after.is_some_and(|n| seen >= n);
            Ok(OperationStatus {
                done,
                artifact: (done && self.with_artifact).then(|| ArtifactRef {
                    uri: "https://files.example.com/out.mp4".to_string(),
                    mime_type: Some("video/mp4".to_string()),
                }),
            })
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_once_operation_is_done() {
        let backend = ScriptedBackend::completing_after(3);
        let handle = OperationHandle::new("operations/test");

        let artifact = poll_until_complete(&backend, &handle, &policy(60), || async { false })
            .await
            .unwrap();

        assert_eq!(artifact.uri, "https://files.example.com/out.mp4");
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_time_out() {
        let backend = ScriptedBackend::never_completing();
        let handle = OperationHandle::new("operations/test");

        let err = poll_until_complete(&backend, &handle, &policy(5), || async { false })
            .await
            .unwrap_err();

        assert_matches::assert_matches!(err, PollError::TimedOut(5));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 5);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn done_without_artifact_is_an_error() {
        let backend = ScriptedBackend::completing_empty();
        let handle = OperationHandle::new("operations/test");

        let err = poll_until_complete(&backend, &handle, &policy(5), || async { false })
            .await
            .unwrap_err();

        assert_matches::assert_matches!(err, PollError::NoArtifact);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_hook_stops_the_loop_before_polling() {
        let backend = ScriptedBackend::completing_after(1);
        let handle = OperationHandle::new("operations/test");

        let err = poll_until_complete(&backend, &handle, &policy(60), || async { true })
            .await
            .unwrap_err();

        assert_matches::assert_matches!(err, PollError::Aborted);
        // The backend was never consulted after the abort.
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_mid_flight_after_some_polls() {
        let backend = ScriptedBackend::never_completing();
        let handle = OperationHandle::new("operations/test");
        let rounds = AtomicU32::new(0);

        let err = poll_until_complete(&backend, &handle, &policy(60), || {
            let n = rounds.fetch_add(1, Ordering::SeqCst);
            async move { n >= 3 }
        })
        .await
        .unwrap_err();

        assert_matches::assert_matches!(err, PollError::Aborted);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }
}
