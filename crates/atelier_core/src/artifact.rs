//! Artifacts extracted from a step's output.

use crate::{ArtifactId, ContentError};
use serde::{Deserialize, Serialize};

/// Identity of an artifact in the live view.
///
/// Artifacts seen mid-stream are addressed by their position in the
/// extraction result; only persisted artifacts carry a gateway id. The two
/// spaces are separate variants and never compare equal.
///
/// # Examples
///
/// ```
/// use atelier_core::{ArtifactId, ArtifactRef};
///
/// assert_ne!(ArtifactRef::Pending(1), ArtifactRef::Persisted(ArtifactId::new(1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactRef {
    /// Index into the current extraction result
    Pending(usize),
    /// Durable record id
    Persisted(ArtifactId),
}

/// Blob keys written for a persisted artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBlobs {
    /// Key of the artifact body
    pub body: Option<String>,
    /// Key of the synthesized vector markup of a character grid
    pub vector: Option<String>,
    /// Key of the raster preview
    pub preview: Option<String>,
}

/// One structured visual unit of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct Artifact {
    /// Live or durable identity
    reference: ArtifactRef,
    /// Sanitized body
    body: String,
    /// Why rendering failed, once rendered
    render_error: Option<ContentError>,
    /// PNG preview, once rendered successfully
    #[serde(skip)]
    preview: Option<Vec<u8>>,
    /// Blob keys, once persisted
    blobs: ArtifactBlobs,
}

impl Artifact {
    /// Artifact seen mid-stream at the given extraction index.
    pub fn pending(index: usize, body: impl Into<String>) -> Self {
        Self {
            reference: ArtifactRef::Pending(index),
            body: body.into(),
            render_error: None,
            preview: None,
            blobs: ArtifactBlobs::default(),
        }
    }

    /// Record a successful render.
    pub fn rendered(mut self, preview: Vec<u8>) -> Self {
        self.preview = Some(preview);
        self.render_error = None;
        self
    }

    /// Record a failed render.
    pub fn failed(mut self, error: ContentError) -> Self {
        self.preview = None;
        self.render_error = Some(error);
        self
    }

    /// Record the durable id and blob keys.
    pub fn persisted(mut self, id: ArtifactId, blobs: ArtifactBlobs) -> Self {
        self.reference = ArtifactRef::Persisted(id);
        self.blobs = blobs;
        self
    }

    /// Whether a preview exists.
    pub fn is_rendered(&self) -> bool {
        self.preview.is_some()
    }
}
