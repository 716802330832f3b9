//! Provider adapter with credential failover.
//!
//! The adapter owns an ordered list of API keys for the same logical
//! provider. A credential-classified submit failure (authentication or
//! quota exhaustion) rotates to the next key and retries exactly once;
//! every other failure surfaces unchanged. Polling always reuses the
//! credential that accepted the submit so an operation is never queried
//! under a key that does not own it.

use std::sync::atomic::{AtomicUsize, Ordering};

use vireo_core::generation::GenerationRequest;

use crate::api::{GenerationApi, OperationStatus, ProviderError};

/// Opaque handle to an in-flight provider operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    /// Server-assigned operation name.
    pub name: String,
    /// Index of the credential that accepted the submission.
    credential: usize,
}

impl OperationHandle {
    /// Handle bound to the first configured credential. Backends that do
    /// not rotate credentials construct handles with this.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential: 0,
        }
    }
}

/// Poll-to-completion generation backend, as seen by the orchestrator.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Queue a generation and return its operation handle.
    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, ProviderError>;

    /// Observe the current state of a queued operation.
    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError>;
}

/// Wire-level operations, abstracted so the adapter's failover logic can be
/// exercised without a live service.
#[async_trait::async_trait]
pub trait OperationsApi: Send + Sync {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ProviderError>;

    async fn poll_operation(
        &self,
        operation_name: &str,
        api_key: &str,
    ) -> Result<OperationStatus, ProviderError>;
}

#[async_trait::async_trait]
impl OperationsApi for GenerationApi {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        GenerationApi::submit_generation(self, request, api_key).await
    }

    async fn poll_operation(
        &self,
        operation_name: &str,
        api_key: &str,
    ) -> Result<OperationStatus, ProviderError> {
        GenerationApi::poll_operation(self, operation_name, api_key).await
    }
}

/// [`GenerationBackend`] over a wire client plus one or more credentials.
pub struct ProviderAdapter {
    api: Box<dyn OperationsApi>,
    credentials: Vec<String>,
    /// Index of the credential used for the next submission. Rotation on
    /// failover is sticky so later submissions start from the key that
    /// last worked.
    current: AtomicUsize,
}

impl ProviderAdapter {
    /// Build an adapter over the given wire client and credential list.
    /// Empty keys are dropped; submissions fail with
    /// [`ProviderError::NoCredentials`] when none remain.
    pub fn new(api: Box<dyn OperationsApi>, credentials: Vec<String>) -> Self {
        let credentials: Vec<String> = credentials
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect();

        if credentials.is_empty() {
            tracing::warn!("No provider API keys configured; submissions will fail");
        } else {
            tracing::info!(count = credentials.len(), "Loaded provider API keys");
        }

        Self {
            api,
            credentials,
            current: AtomicUsize::new(0),
        }
    }

    /// Build the production adapter from environment variables:
    /// `PROVIDER_API_URL` plus `PROVIDER_API_KEY` / `PROVIDER_API_KEY_2`.
    pub fn from_env() -> Self {
        let api_url = std::env::var("PROVIDER_API_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());

        let credentials = [
            std::env::var("PROVIDER_API_KEY").unwrap_or_default(),
            std::env::var("PROVIDER_API_KEY_2").unwrap_or_default(),
        ]
        .into_iter()
        .collect();

        Self::new(Box::new(GenerationApi::new(api_url)), credentials)
    }

    fn key(&self, index: usize) -> &str {
        &self.credentials[index % self.credentials.len()]
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ProviderAdapter {
    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, ProviderError> {
        if self.credentials.is_empty() {
            return Err(ProviderError::NoCredentials);
        }

        let primary = self.current.load(Ordering::Relaxed) % self.credentials.len();

        match self.api.submit_generation(request, self.key(primary)).await {
            Ok(name) => Ok(OperationHandle {
                name,
                credential: primary,
            }),
            Err(err) if err.is_credential_error() && self.credentials.len() > 1 => {
                let fallback = (primary + 1) % self.credentials.len();
                tracing::warn!(
                    error = %err,
                    credential = primary,
                    fallback,
                    "Submit failed on credential, rotating and retrying once",
                );
                self.current.store(fallback, Ordering::Relaxed);

                let name = self.api.submit_generation(request, self.key(fallback)).await?;
                Ok(OperationHandle {
                    name,
                    credential: fallback,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
        if self.credentials.is_empty() {
            return Err(ProviderError::NoCredentials);
        }
        self.api
            .poll_operation(&handle.name, self.key(handle.credential))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::api::ArtifactRef;

    /// Fake wire client that fails submissions for the keys in `reject`
    /// and records which key served each call.
    struct FakeApi {
        reject: Vec<&'static str>,
        reject_status: u16,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeApi {
        fn rejecting(reject: Vec<&'static str>, status: u16) -> Self {
            Self {
                reject,
                reject_status: status,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl OperationsApi for FakeApi {
        async fn submit_generation(
            &self,
            _request: &GenerationRequest,
            api_key: &str,
        ) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push(api_key.to_string());
            if self.reject.contains(&api_key) {
                return Err(ProviderError::Api {
                    status: self.reject_status,
                    body: "rejected".to_string(),
                });
            }
            Ok(format!("operations/{api_key}"))
        }

        async fn poll_operation(
            &self,
            operation_name: &str,
            api_key: &str,
        ) -> Result<OperationStatus, ProviderError> {
            assert_eq!(operation_name, format!("operations/{api_key}"));
            Ok(OperationStatus {
                done: true,
                artifact: Some(ArtifactRef {
                    uri: "https://files.example.com/out.mp4".to_string(),
                    mime_type: None,
                }),
            })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a fox in the snow".to_string(),
            model: vireo_core::generation::MODEL_STANDARD.to_string(),
            duration_secs: 8,
            aspect_ratio: "16:9".to_string(),
            reference_image_url: None,
        }
    }

    fn adapter(api: FakeApi, keys: &[&str]) -> ProviderAdapter {
        ProviderAdapter::new(
            Box::new(api),
            keys.iter().map(|k| k.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn submit_uses_primary_when_healthy() {
        let adapter = adapter(FakeApi::rejecting(vec![], 401), &["alpha", "bravo"]);
        let handle = adapter.submit(&request()).await.unwrap();
        assert_eq!(handle.name, "operations/alpha");
    }

    #[tokio::test]
    async fn auth_failure_fails_over_to_secondary() {
        let adapter = adapter(FakeApi::rejecting(vec!["alpha"], 401), &["alpha", "bravo"]);
        let handle = adapter.submit(&request()).await.unwrap();
        assert_eq!(handle.name, "operations/bravo");

        // Polling sticks to the credential that accepted the submit.
        let status = adapter.poll(&handle).await.unwrap();
        assert!(status.done);
    }

    #[tokio::test]
    async fn rate_limit_also_triggers_failover() {
        let adapter = adapter(FakeApi::rejecting(vec!["alpha"], 429), &["alpha", "bravo"]);
        let handle = adapter.submit(&request()).await.unwrap();
        assert_eq!(handle.name, "operations/bravo");
    }

    #[tokio::test]
    async fn failover_retries_exactly_once() {
        let api = FakeApi::rejecting(vec!["alpha", "bravo"], 401);
        let calls = Arc::clone(&api.calls);
        let adapter = ProviderAdapter::new(
            Box::new(api),
            vec!["alpha".to_string(), "bravo".to_string()],
        );

        let err = adapter.submit(&request()).await.unwrap_err();
        assert!(err.is_credential_error());
        // One attempt per key, nothing more.
        assert_eq!(*calls.lock().unwrap(), vec!["alpha", "bravo"]);
    }

    #[tokio::test]
    async fn non_credential_error_does_not_rotate() {
        let api = FakeApi::rejecting(vec!["alpha"], 500);
        let calls = Arc::clone(&api.calls);
        let adapter = ProviderAdapter::new(
            Box::new(api),
            vec!["alpha".to_string(), "bravo".to_string()],
        );

        let err = adapter.submit(&request()).await.unwrap_err();
        assert!(!err.is_credential_error());
        assert_eq!(*calls.lock().unwrap(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn single_credential_surfaces_failure_without_retry() {
        let adapter = adapter(FakeApi::rejecting(vec!["alpha"], 401), &["alpha"]);
        let err = adapter.submit(&request()).await.unwrap_err();
        assert!(err.is_credential_error());
    }

    #[tokio::test]
    async fn rotation_is_sticky_for_later_submissions() {
        let api = FakeApi::rejecting(vec!["alpha"], 401);
        let adapter = ProviderAdapter::new(
            Box::new(api),
            vec!["alpha".to_string(), "bravo".to_string()],
        );

        adapter.submit(&request()).await.unwrap();
        let handle = adapter.submit(&request()).await.unwrap();
        assert_eq!(handle.name, "operations/bravo");
    }

    #[tokio::test]
    async fn no_credentials_is_an_error() {
        let adapter = adapter(FakeApi::rejecting(vec![], 401), &[]);
        assert!(matches!(
            adapter.submit(&request()).await,
            Err(ProviderError::NoCredentials)
        ));
    }
}
