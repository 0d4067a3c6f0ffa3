//! Persistence gateway contract.

use async_trait::async_trait;
use atelier_core::{
    ArtifactId, ContentError, GenerationConfig, GenerationId, ImageId, StepId, StepUpdate,
};
use atelier_error::AtelierResult;
use serde::{Deserialize, Serialize};

/// What a blob holds.
///
/// # Examples
///
/// ```
/// use atelier_interface::BlobKind;
///
/// assert_eq!(BlobKind::RasterPreview.content_type(), "image/png");
/// assert_eq!(BlobKind::GridBody.extension(), Some("txt"));
/// assert_eq!(BlobKind::InputImage.extension(), None);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum BlobKind {
    /// Normalized vector markup
    VectorBody,
    /// Character-grid text
    GridBody,
    /// PNG preview
    RasterPreview,
    /// Uploaded reference image
    InputImage,
}

impl BlobKind {
    /// MIME type stored with the blob. Input images carry their own.
    pub fn content_type(&self) -> &'static str {
        match self {
            BlobKind::VectorBody => "image/svg+xml",
            BlobKind::GridBody => "text/plain; charset=utf-8",
            BlobKind::RasterPreview => "image/png",
            BlobKind::InputImage => "application/octet-stream",
        }
    }

    /// Fixed file extension, if the kind has one.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            BlobKind::VectorBody => Some("svg"),
            BlobKind::GridBody => Some("txt"),
            BlobKind::RasterPreview => Some("png"),
            BlobKind::InputImage => None,
        }
    }
}

/// Records a blob belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum BlobOwner {
    /// Artifact of a step
    #[display("artifact {}/{}/{}", generation_id, step_id, artifact_id)]
    Artifact {
        /// Owning generation
        generation_id: GenerationId,
        /// Owning step
        step_id: StepId,
        /// Artifact record
        artifact_id: ArtifactId,
    },
    /// Reference image of a generation
    #[display("input image {}", image_id)]
    InputImage {
        /// Image record
        image_id: ImageId,
        /// File extension derived from the MIME type
        extension: String,
    },
}

/// Durable records plus blob storage.
///
/// Every method is a single write; callers own ordering and compensation.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create the root record of a run.
    async fn create_generation(&self, config: &GenerationConfig) -> AtelierResult<GenerationId>;

    /// Create a pending step and return its globally monotonic id.
    async fn create_step(
        &self,
        generation_id: &GenerationId,
        rendered_prompt: &str,
    ) -> AtelierResult<StepId>;

    /// Overwrite a step's mutable fields.
    async fn update_step(&self, step_id: StepId, update: StepUpdate) -> AtelierResult<()>;

    /// Create an artifact record for a step.
    async fn create_artifact(
        &self,
        step_id: StepId,
        body: &str,
        render_error: Option<&ContentError>,
    ) -> AtelierResult<ArtifactId>;

    /// Delete an artifact record and any blobs already written for it.
    async fn delete_artifact(&self, artifact_id: ArtifactId) -> AtelierResult<()>;

    /// Create a reference image record.
    async fn create_input_image(
        &self,
        generation_id: &GenerationId,
        mime: &str,
    ) -> AtelierResult<ImageId>;

    /// Delete a reference image record.
    async fn delete_input_image(&self, image_id: ImageId) -> AtelierResult<()>;

    /// Store a blob and return its storage key.
    async fn upload_blob(
        &self,
        kind: BlobKind,
        owner: &BlobOwner,
        bytes: Vec<u8>,
    ) -> AtelierResult<String>;
}
