//! Blob storage and a local persistence gateway for Atelier.
//!
//! Blobs are addressed by storage keys laid out per generation:
//!
//! ```text
//! {generation_id}/{step_id}_{artifact_id}.svg   normalized vector body
//! {generation_id}/{step_id}_{artifact_id}.txt   character-grid body
//! {generation_id}/{step_id}_{artifact_id}.png   raster preview
//! input/{image_id}.{ext}                        reference image
//! ```
//!
//! [`LocalGateway`] keeps relational records in memory, hands out globally
//! monotonic step ids, and can mirror every generation into a JSON snapshot.
//!
//! # Example
//!
//! ```rust
//! use atelier_storage::{BlobStore, MemoryBlobStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryBlobStore::new();
//! let stored = store.put("g1/1_1.svg", "image/svg+xml", b"<svg/>".to_vec()).await?;
//! assert_eq!(store.get(&stored.key).await?, b"<svg/>");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use atelier_error::AtelierResult;
use atelier_interface::{BlobKind, BlobOwner};

mod filesystem;
mod gateway;
mod memory;
mod records;

pub use atelier_error::{StorageError, StorageErrorKind};
pub use filesystem::FileSystemBlobStore;
pub use gateway::LocalGateway;
pub use memory::MemoryBlobStore;
pub use records::{
    ArtifactRecord, GenerationRecord, GenerationSnapshot, InputImageRecord, StepRecord,
};

/// Trait for pluggable blob storage backends.
///
/// Implementations store opaque bytes under caller-chosen keys; the gateway
/// owns the key layout.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing any previous content.
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> AtelierResult<StoredBlob>;

    /// Read the bytes stored under `key`.
    async fn get(&self, key: &str) -> AtelierResult<Vec<u8>>;

    /// Remove the blob stored under `key`.
    async fn delete(&self, key: &str) -> AtelierResult<()>;

    /// Whether a blob exists under `key`.
    async fn exists(&self, key: &str) -> AtelierResult<bool>;
}

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Storage key
    pub key: String,
    /// SHA-256 of the content, hex encoded
    pub content_hash: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// MIME type
    pub content_type: String,
}

/// Storage key for a blob of `kind` owned by `owner`.
///
/// # Examples
///
/// ```
/// use atelier_core::{ArtifactId, GenerationId, ImageId, StepId};
/// use atelier_interface::{BlobKind, BlobOwner};
/// use atelier_storage::storage_key;
///
/// let owner = BlobOwner::Artifact {
///     generation_id: GenerationId::from("g1"),
///     step_id: StepId::new(4),
///     artifact_id: ArtifactId::new(9),
/// };
/// assert_eq!(storage_key(BlobKind::VectorBody, &owner), "g1/4_9.svg");
/// assert_eq!(storage_key(BlobKind::RasterPreview, &owner), "g1/4_9.png");
///
/// let image = BlobOwner::InputImage { image_id: ImageId::new(2), extension: "jpg".into() };
/// assert_eq!(storage_key(BlobKind::InputImage, &image), "input/2.jpg");
/// ```
pub fn storage_key(kind: BlobKind, owner: &BlobOwner) -> String {
    match owner {
        BlobOwner::Artifact {
            generation_id,
            step_id,
            artifact_id,
        } => format!(
            "{}/{}_{}.{}",
            generation_id,
            step_id,
            artifact_id,
            kind.extension().unwrap_or("bin")
        ),
        BlobOwner::InputImage {
            image_id,
            extension,
        } => format!("input/{}.{}", image_id, extension),
    }
}

pub(crate) fn content_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
