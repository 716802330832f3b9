//! Artifact materialization: provider reference -> permanent asset.
//!
//! The artifact is downloaded into a scoped temporary file, uploaded to
//! durable storage under a namespaced key, and (for video artifacts) a
//! still-frame thumbnail is derived server-side. The temp file lives in a
//! [`tempfile::NamedTempFile`], so it is unlinked when the guard drops on
//! every exit path -- success, upload failure, or thumbnail failure.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use vireo_core::generation::{artifact_public_id, THUMBNAIL_OFFSET_SECS};
use vireo_core::types::JobId;
use vireo_provider::ArtifactRef;
use vireo_storage::{ObjectStorage, StorageError};

/// Errors raised while materializing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// Fetching the artifact bytes from the provider reference failed.
    #[error("Failed to download artifact: {0}")]
    Download(String),

    /// Durable storage rejected the upload or transform.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Local spool I/O failed.
    #[error("Spool I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A materialized artifact, ready to be written onto the job row.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub artifact_url: String,
    pub thumbnail_url: Option<String>,
    pub metadata: serde_json::Value,
}

/// Turns provider artifact references into permanently hosted assets.
pub struct Materializer {
    http: reqwest::Client,
    storage: Arc<dyn ObjectStorage>,
    spool_dir: PathBuf,
}

impl Materializer {
    /// * `spool_dir` - directory for in-flight downloads; created on demand.
    pub fn new(storage: Arc<dyn ObjectStorage>, spool_dir: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            storage,
            spool_dir,
        }
    }

    /// Materialize `artifact` for `job_id`.
    pub async fn materialize(
        &self,
        job_id: JobId,
        artifact: &ArtifactRef,
    ) -> Result<Materialized, MaterializeError> {
        tokio::fs::create_dir_all(&self.spool_dir).await?;

        // The guard owns the temp file for the whole function; dropping it
        // (on any return) unlinks the file.
        let spool = tempfile::Builder::new()
            .prefix(&format!("{job_id}-"))
            .suffix(".mp4")
            .tempfile_in(&self.spool_dir)?;

        self.download(&artifact.uri, spool.path()).await?;
        tracing::debug!(%job_id, uri = %artifact.uri, "Artifact downloaded to spool");

        let public_id = artifact_public_id(job_id);
        let stored = self.storage.upload_video(spool.path(), &public_id).await?;

        let is_video = artifact
            .mime_type
            .as_deref()
            .map(|mime| !mime.starts_with("image/"))
            .unwrap_or(true);

        let thumbnail_url = if is_video {
            Some(
                self.storage
                    .derive_thumbnail(&public_id, THUMBNAIL_OFFSET_SECS)
                    .await?,
            )
        } else {
            None
        };

        tracing::info!(
            %job_id,
            artifact_url = %stored.url,
            "Artifact materialized",
        );

        Ok(Materialized {
            artifact_url: stored.url,
            thumbnail_url,
            metadata: stored.metadata.to_value(),
        })
    }

    /// Stream the artifact bytes to `dest`.
    async fn download(&self, uri: &str, dest: &std::path::Path) -> Result<(), MaterializeError> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| MaterializeError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MaterializeError::Download(format!(
                "artifact fetch returned HTTP {status}"
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MaterializeError::Download(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
