//! Durable media-storage client.
//!
//! The storage service hosts uploaded artifacts under permanent public
//! URLs and can derive transformed renditions (still-frame thumbnails)
//! server-side. [`ObjectStorage`] is the seam the materializer and the
//! delete cascade program against; [`media::MediaStorageClient`] is the
//! HTTP implementation.

pub mod media;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use media::MediaStorageClient;

/// Resource type for video artifacts.
pub const RESOURCE_VIDEO: &str = "video";
/// Resource type for image assets (thumbnails, reference images).
pub const RESOURCE_IMAGE: &str = "image";

/// Provider-reported attributes of an uploaded artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub bytes: Option<i64>,
    pub format: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    #[serde(rename = "duration")]
    pub duration_secs: Option<f64>,
}

impl ArtifactMetadata {
    /// JSON form persisted on the job row.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A permanently hosted artifact.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Permanent public URL.
    pub url: String,
    pub metadata: ArtifactMetadata,
}

/// Errors from the media-storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The storage service returned a non-2xx status code.
    #[error("Storage service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Reading the local file to upload failed.
    #[error("Failed to read upload source: {0}")]
    Io(#[from] std::io::Error),

    /// The service answered 2xx but the body was not in the expected shape.
    #[error("Malformed storage response: {0}")]
    Malformed(String),
}

/// Durable object-storage operations used by the pipeline.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a local video file under `public_id`, returning its permanent
    /// URL and reported metadata.
    async fn upload_video(
        &self,
        local_path: &Path,
        public_id: &str,
    ) -> Result<StoredArtifact, StorageError>;

    /// Request a still-frame thumbnail of an uploaded video at the given
    /// offset. Returns the thumbnail's permanent URL.
    async fn derive_thumbnail(
        &self,
        public_id: &str,
        offset_secs: u32,
    ) -> Result<String, StorageError>;

    /// Best-effort removal of a stored asset. Unknown ids succeed so the
    /// delete cascade stays idempotent.
    async fn delete(&self, public_id: &str, resource_type: &str) -> Result<(), StorageError>;
}
