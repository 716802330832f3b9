//! HTTP implementation of [`ObjectStorage`] against the media CDN's
//! upload API.
//!
//! Requests are form-signed: every mutating call carries `api_key`,
//! `timestamp`, and a SHA-256 signature over the sorted parameters plus
//! the API secret.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{ArtifactMetadata, ObjectStorage, StorageError, StoredArtifact};

/// Configuration for the media-storage service, loaded from environment
/// variables.
///
/// | Env Var              | Required | Default                         |
/// |----------------------|----------|---------------------------------|
/// | `STORAGE_API_URL`    | no       | `https://api.mediacdn.example`  |
/// | `STORAGE_CLOUD_NAME` | **yes**  | --                              |
/// | `STORAGE_API_KEY`    | **yes**  | --                              |
/// | `STORAGE_API_SECRET` | **yes**  | --                              |
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub api_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics when a required variable is missing, which is the desired
    /// behaviour -- the materializer cannot run without durable storage.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("STORAGE_API_URL")
                .unwrap_or_else(|_| "https://api.mediacdn.example".into()),
            cloud_name: std::env::var("STORAGE_CLOUD_NAME")
                .expect("STORAGE_CLOUD_NAME must be set"),
            api_key: std::env::var("STORAGE_API_KEY").expect("STORAGE_API_KEY must be set"),
            api_secret: std::env::var("STORAGE_API_SECRET")
                .expect("STORAGE_API_SECRET must be set"),
        }
    }
}

/// Media-storage client for a single cloud.
pub struct MediaStorageClient {
    client: reqwest::Client,
    config: StorageConfig,
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UploadPayload {
    secure_url: String,
    bytes: Option<i64>,
    format: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExplicitPayload {
    #[serde(default)]
    eager: Vec<EagerPayload>,
}

#[derive(Debug, Deserialize)]
struct EagerPayload {
    secure_url: Option<String>,
}

impl MediaStorageClient {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{resource_type}/{action}",
            self.config.api_url, self.config.cloud_name
        )
    }

    /// Sign a parameter set: SHA-256 hex over `key=value` pairs sorted by
    /// key, joined with `&`, with the API secret appended.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        let joined = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Build the signed form common to all mutating calls.
    fn signed_form(&self, params: Vec<(&'static str, String)>) -> reqwest::multipart::Form {
        let timestamp = unix_timestamp();

        let mut to_sign: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        let ts = timestamp.to_string();
        to_sign.push(("timestamp", ts.as_str()));

        let signature = self.sign(&to_sign);

        let mut form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", ts.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }
        form
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

/// Seconds since the Unix epoch, for request signing.
fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl ObjectStorage for MediaStorageClient {
    async fn upload_video(
        &self,
        local_path: &Path,
        public_id: &str,
    ) -> Result<StoredArtifact, StorageError> {
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(
                local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "artifact.mp4".to_string()),
            )
            .mime_str("video/mp4")
            .map_err(StorageError::Request)?;

        let form = self
            .signed_form(vec![("public_id", public_id.to_string())])
            .part("file", file_part);

        let response = self
            .client
            .post(self.endpoint(crate::RESOURCE_VIDEO, "upload"))
            .multipart(form)
            .send()
            .await?;

        let payload: UploadPayload = Self::parse_response(response).await?;

        tracing::info!(
            public_id,
            bytes = size,
            url = %payload.secure_url,
            "Artifact uploaded to durable storage",
        );

        Ok(StoredArtifact {
            url: payload.secure_url,
            metadata: ArtifactMetadata {
                bytes: payload.bytes,
                format: payload.format,
                width: payload.width,
                height: payload.height,
                duration_secs: payload.duration,
            },
        })
    }

    async fn derive_thumbnail(
        &self,
        public_id: &str,
        offset_secs: u32,
    ) -> Result<String, StorageError> {
        // Eager transform: still frame at `offset_secs`, JPEG, 640x360 fill.
        let transformation = format!("so_{offset_secs},w_640,h_360,c_fill,f_jpg");

        let form = self.signed_form(vec![
            ("public_id", public_id.to_string()),
            ("type", "upload".to_string()),
            ("eager", transformation),
        ]);

        let response = self
            .client
            .post(self.endpoint(crate::RESOURCE_VIDEO, "explicit"))
            .multipart(form)
            .send()
            .await?;

        let payload: ExplicitPayload = Self::parse_response(response).await?;
        payload
            .eager
            .into_iter()
            .find_map(|eager| eager.secure_url)
            .ok_or_else(|| {
                StorageError::Malformed("explicit response carried no eager URL".to_string())
            })
    }

    async fn delete(&self, public_id: &str, resource_type: &str) -> Result<(), StorageError> {
        let form = self.signed_form(vec![("public_id", public_id.to_string())]);

        let response = self
            .client
            .post(self.endpoint(resource_type, "destroy"))
            .multipart(form)
            .send()
            .await?;

        // "not found" bodies still come back 2xx; both count as deleted.
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(public_id, resource_type, "Deleted stored asset");
        Ok(())
    }
}
