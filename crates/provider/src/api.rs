//! REST client for the generation service's long-running-operation API.
//!
//! Two endpoints matter here: `POST /models/{model}:generateVideos` queues a
//! generation and returns an operation name, and `GET /{operation}` reports
//! whether the operation is done and, once it is, the produced artifact URI.

use serde::Deserialize;
use vireo_core::generation::GenerationRequest;

/// HTTP client for the generation service.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
}

/// Reference to a provider-produced artifact, resolvable by plain GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Download URI for the artifact bytes.
    pub uri: String,
    /// MIME type when the provider reports one.
    pub mime_type: Option<String>,
}

/// One poll observation of a long-running operation.
#[derive(Debug, Clone)]
pub struct OperationStatus {
    /// Whether the operation has finished (successfully or not).
    pub done: bool,
    /// The artifact reference, present only on successful completion.
    pub artifact: Option<ArtifactRef>,
}

/// Errors from the generation service API layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The operation finished but the provider reported a failure.
    #[error("Generation failed: {0}")]
    Failed(String),

    /// No usable credential is configured.
    #[error("No provider API keys configured")]
    NoCredentials,
}

impl ProviderError {
    /// Whether this failure is attributable to the credential used:
    /// authentication rejections and quota exhaustion. These trigger a
    /// one-shot failover to the next configured key during submission.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Api {
                status: 401 | 403 | 429,
                ..
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitPayload {
    /// Server-assigned operation name, e.g. `operations/abc123`.
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationPayload {
    #[serde(default)]
    done: bool,
    error: Option<OperationErrorPayload>,
    response: Option<OperationResponsePayload>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorPayload {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponsePayload {
    #[serde(default)]
    generated_videos: Vec<GeneratedVideoPayload>,
    /// Older operations report a flat URL instead of a video list.
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideoPayload {
    video: Option<VideoFilePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoFilePayload {
    uri: Option<String>,
    mime_type: Option<String>,
}

impl OperationPayload {
    /// Collapse the wire shape into an [`OperationStatus`], surfacing a
    /// provider-reported operation error as [`ProviderError::Failed`].
    fn into_status(self) -> Result<OperationStatus, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::Failed(
                error
                    .message
                    .unwrap_or_else(|| "provider reported an unspecified error".to_string()),
            ));
        }

        let artifact = self.response.and_then(|response| {
            response
                .generated_videos
                .into_iter()
                .find_map(|video| video.video)
                .and_then(|file| {
                    file.uri.map(|uri| ArtifactRef {
                        uri,
                        mime_type: file.mime_type,
                    })
                })
                .or_else(|| {
                    response.video_url.map(|uri| ArtifactRef {
                        uri,
                        mime_type: None,
                    })
                })
        });

        Ok(OperationStatus {
            done: self.done,
            artifact,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl GenerationApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Queue a generation. Returns the server-assigned operation name.
    pub async fn submit_generation(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let mut body = serde_json::json!({
            "prompt": request.prompt,
            "config": {
                "aspectRatio": request.aspect_ratio,
                "durationSeconds": request.duration_secs,
            },
        });
        if let Some(ref reference) = request.reference_image_url {
            body["config"]["referenceImageUrl"] = serde_json::json!(reference);
        }

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateVideos",
                self.api_url, request.model
            ))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let payload: SubmitPayload = Self::parse_response(response).await?;
        Ok(payload.name)
    }

    /// Fetch the current state of an operation.
    pub async fn poll_operation(
        &self,
        operation_name: &str,
        api_key: &str,
    ) -> Result<OperationStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_url, operation_name))
            .query(&[("key", api_key)])
            .send()
            .await?;

        let payload: OperationPayload = Self::parse_response(response).await?;
        payload.into_status()
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, then parse the JSON
    /// body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}
