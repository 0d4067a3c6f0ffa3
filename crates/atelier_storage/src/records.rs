//! Record types kept by the local gateway.

use atelier_core::{
    ArtifactBlobs, ArtifactId, ContentError, Cost, GenerationConfig, GenerationId, ImageId,
    StepId, StepStatus, Usage,
};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Root record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct GenerationRecord {
    /// Identity
    pub(crate) id: GenerationId,
    /// Settings the run started with
    pub(crate) config: GenerationConfig,
    /// Creation time
    pub(crate) created_at: DateTime<Utc>,
}

/// One provider round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct StepRecord {
    /// Globally monotonic id
    pub(crate) id: StepId,
    /// Owning generation
    pub(crate) generation_id: GenerationId,
    /// Prompt text sent for this step
    pub(crate) rendered_prompt: String,
    /// Lifecycle status
    pub(crate) status: StepStatus,
    /// Accumulated model output
    pub(crate) raw_output: String,
    /// Token usage
    pub(crate) usage: Option<Usage>,
    /// Dollar cost
    pub(crate) cost: Option<Cost>,
    /// Failure reason
    pub(crate) error_message: Option<String>,
    /// Creation time
    pub(crate) created_at: DateTime<Utc>,
    /// Last update time
    pub(crate) updated_at: DateTime<Utc>,
}

/// Persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ArtifactRecord {
    /// Identity
    pub(crate) id: ArtifactId,
    /// Owning step
    pub(crate) step_id: StepId,
    /// Sanitized body
    pub(crate) body: String,
    /// Render failure, if any
    pub(crate) render_error: Option<ContentError>,
    /// Blob keys uploaded so far
    pub(crate) blobs: ArtifactBlobs,
    /// Creation time
    pub(crate) created_at: DateTime<Utc>,
}

/// Persisted reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct InputImageRecord {
    /// Identity
    pub(crate) id: ImageId,
    /// Owning generation
    pub(crate) generation_id: GenerationId,
    /// MIME type
    pub(crate) mime: String,
    /// Blob key, once uploaded
    pub(crate) storage_key: Option<String>,
}

/// Everything recorded for one generation, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    /// Root record
    pub generation: GenerationRecord,
    /// Steps in id order
    pub steps: Vec<StepRecord>,
    /// Artifacts of those steps in id order
    pub artifacts: Vec<ArtifactRecord>,
    /// Reference images in id order
    pub input_images: Vec<InputImageRecord>,
}
