//! Core data types for the Atelier engine.
//!
//! These are plain values shared by the provider adapters, the renderer, the
//! persistence gateway and the refinement loop. Nothing here performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod content;
mod format;
mod generation;
mod ids;
mod input;
mod media;
mod message;
mod request;
mod role;
mod step;
mod usage;

pub use artifact::{Artifact, ArtifactBlobs, ArtifactRef};
pub use content::{ContentError, NO_ARTIFACT_MESSAGE};
pub use format::{Dimensions, Format};
pub use generation::{
    ContinuationPolicy, GenerationConfig, GenerationConfigBuilder, HistoryPolicy,
    ProviderSettings, ReferenceImage,
};
pub use ids::{ArtifactId, GenerationId, ImageId, StepId};
pub use input::Input;
pub use media::MediaSource;
pub use message::Message;
pub use request::GenerateRequest;
pub use role::Role;
pub use step::{StepStatus, StepUpdate};
pub use usage::{Cost, Pricing, Usage};
