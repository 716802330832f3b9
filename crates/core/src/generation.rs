//! Generation request parameters, validation, and polling policy.
//!
//! The orchestrator treats request parameters as opaque beyond validation;
//! everything here is checked once at submission time so the background
//! pipeline never has to re-validate.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobId;

// ---------------------------------------------------------------------------
// Supported parameter enumerations
// ---------------------------------------------------------------------------

/// Standard-quality video model.
pub const MODEL_STANDARD: &str = "veo-3.1-generate-preview";
/// Faster, lower-latency video model.
pub const MODEL_FAST: &str = "veo-3.1-fast-generate-preview";

/// All model identifiers accepted at submission.
pub const SUPPORTED_MODELS: &[&str] = &[MODEL_STANDARD, MODEL_FAST];

/// All aspect ratios accepted at submission.
pub const VALID_ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

/// Shortest clip the provider will render.
pub const MIN_DURATION_SECS: i32 = 4;
/// Longest clip the provider will render.
pub const MAX_DURATION_SECS: i32 = 8;
/// Clip length applied when a submission omits one.
pub const DEFAULT_DURATION_SECS: i32 = 8;
/// Aspect ratio applied when a submission omits one.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// Polling policy
// ---------------------------------------------------------------------------

/// Seconds to sleep between provider status polls.
pub const POLL_INTERVAL_SECS: u64 = 10;

/// Maximum number of polls before a job is failed as timed out.
/// 60 attempts at 10 seconds bounds a job to ten minutes of waiting.
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// Still-frame offset (seconds into the clip) used for thumbnails.
pub const THUMBNAIL_OFFSET_SECS: u32 = 1;

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Validated generation inputs, passed through to the provider adapter
/// and persisted on the job row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub duration_secs: i32,
    pub aspect_ratio: String,
    /// Optional reference asset guiding the generation.
    pub reference_image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a model identifier is one of the supported set.
pub fn validate_model(model: &str) -> Result<(), CoreError> {
    if SUPPORTED_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported model '{model}'. Supported models: {}",
            SUPPORTED_MODELS.join(", ")
        )))
    }
}

/// Validate that an aspect ratio is one of the supported set.
pub fn validate_aspect_ratio(ratio: &str) -> Result<(), CoreError> {
    if VALID_ASPECT_RATIOS.contains(&ratio) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported aspect ratio '{ratio}'. Supported ratios: {}",
            VALID_ASPECT_RATIOS.join(", ")
        )))
    }
}

/// Validate that a clip duration lies within the provider's allowed range.
pub fn validate_duration(duration_secs: i32) -> Result<(), CoreError> {
    if (MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Duration must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS} seconds, got {duration_secs}"
        )))
    }
}

/// Validate that a reference asset URL is non-empty and uses http(s).
pub fn validate_reference_url(url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Reference asset URL must not be empty".to_string(),
        ));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "Reference asset URL must start with http:// or https://, got: '{trimmed}'"
        )));
    }
    Ok(())
}

/// Validate a full generation request before a job is created.
///
/// Rules:
/// - Prompt must be non-empty after trimming and at most [`MAX_PROMPT_LEN`]
///   characters.
/// - Model, duration, and aspect ratio must be drawn from the supported
///   enumerations.
/// - A reference asset URL, when present, must be a well-formed http(s) URL.
pub fn validate_request(request: &GenerationRequest) -> Result<(), CoreError> {
    if request.prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    if request.prompt.len() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt must not exceed {MAX_PROMPT_LEN} characters"
        )));
    }

    validate_model(&request.model)?;
    validate_duration(request.duration_secs)?;
    validate_aspect_ratio(&request.aspect_ratio)?;

    if let Some(ref url) = request.reference_image_url {
        validate_reference_url(url)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Durable-storage naming
// ---------------------------------------------------------------------------

/// Folder under which all generation artifacts are stored.
pub const ARTIFACT_FOLDER: &str = "generations";

/// Build the namespaced storage key for a job's artifact.
pub fn artifact_public_id(job_id: JobId) -> String {
    format!("{ARTIFACT_FOLDER}/{job_id}")
}

/// Recover a storage public id from a delivery URL.
///
/// Takes the last two path segments (folder + filename) and strips the
/// format extension. Returns `None` when the URL has no usable path.
pub fn extract_public_id(url: &str) -> Option<String> {
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = clean.rsplit('/').filter(|s| !s.is_empty());

    let file = segments.next()?;
    let folder = segments.next()?;

    // Strip scheme remnants ("https:" parses as a folder on short URLs).
    if folder.ends_with(':') || folder.contains('.') {
        return None;
    }

    let stem = file.split('.').next().unwrap_or(file);
    if stem.is_empty() {
        return None;
    }
    Some(format!("{folder}/{stem}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
