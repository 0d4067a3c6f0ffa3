//! Local persistence gateway.

use crate::{
    ArtifactRecord, BlobStore, GenerationRecord, GenerationSnapshot, InputImageRecord, StepRecord,
    storage_key,
};
use async_trait::async_trait;
use atelier_core::{
    ArtifactBlobs, ArtifactId, ContentError, GenerationConfig, GenerationId, ImageId, StepId,
    StepUpdate,
};
use atelier_error::{AtelierResult, PersistenceError, PersistenceErrorKind};
use atelier_interface::{BlobKind, BlobOwner, PersistenceGateway};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Records {
    generations: BTreeMap<GenerationId, GenerationRecord>,
    steps: BTreeMap<StepId, StepRecord>,
    artifacts: BTreeMap<ArtifactId, ArtifactRecord>,
    input_images: BTreeMap<ImageId, InputImageRecord>,
    last_step_id: i64,
    last_artifact_id: i64,
    last_image_id: i64,
}

impl Records {
    fn snapshot(&self, generation_id: &GenerationId) -> Option<GenerationSnapshot> {
        let generation = self.generations.get(generation_id)?.clone();
        let steps: Vec<StepRecord> = self
            .steps
            .values()
            .filter(|s| &s.generation_id == generation_id)
            .cloned()
            .collect();
        let artifacts = self
            .artifacts
            .values()
            .filter(|a| steps.iter().any(|s| s.id == a.step_id))
            .cloned()
            .collect();
        let input_images = self
            .input_images
            .values()
            .filter(|i| &i.generation_id == generation_id)
            .cloned()
            .collect();
        Some(GenerationSnapshot {
            generation,
            steps,
            artifacts,
            input_images,
        })
    }

    fn generation_of_step(&self, step_id: StepId) -> Option<GenerationId> {
        self.steps.get(&step_id).map(|s| s.generation_id.clone())
    }

    fn generation_of_artifact(&self, artifact_id: ArtifactId) -> Option<GenerationId> {
        self.artifacts
            .get(&artifact_id)
            .and_then(|a| self.generation_of_step(a.step_id))
    }
}

/// Persistence gateway keeping records in memory and blobs in a [`BlobStore`].
///
/// Step ids come from one counter shared by every generation, so they are
/// strictly increasing across the whole gateway. With a snapshot directory
/// configured, each mutation rewrites `{dir}/{generation_id}.json`.
#[derive(Clone)]
pub struct LocalGateway {
    blobs: Arc<dyn BlobStore>,
    records: Arc<Mutex<Records>>,
    snapshot_dir: Option<PathBuf>,
    snapshot_lock: Arc<Mutex<()>>,
}

impl LocalGateway {
    /// Gateway over the given blob store, without snapshots.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            records: Arc::new(Mutex::new(Records::default())),
            snapshot_dir: None,
            snapshot_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Mirror every generation into a JSON file under `dir`.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Blob store used for uploads.
    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Current records of one generation.
    pub async fn snapshot(&self, generation_id: &GenerationId) -> Option<GenerationSnapshot> {
        self.records.lock().await.snapshot(generation_id)
    }

    /// Step record by id.
    pub async fn step(&self, step_id: StepId) -> Option<StepRecord> {
        self.records.lock().await.steps.get(&step_id).cloned()
    }

    /// Artifact record by id.
    pub async fn artifact(&self, artifact_id: ArtifactId) -> Option<ArtifactRecord> {
        self.records.lock().await.artifacts.get(&artifact_id).cloned()
    }

    /// Number of artifact records across all generations.
    pub async fn artifact_count(&self) -> usize {
        self.records.lock().await.artifacts.len()
    }

    async fn write_snapshot(&self, generation_id: Option<GenerationId>) -> AtelierResult<()> {
        let (Some(dir), Some(generation_id)) = (&self.snapshot_dir, generation_id) else {
            return Ok(());
        };

        // Serialize under the snapshot lock so the newest state is written last.
        let _guard = self.snapshot_lock.lock().await;
        let Some(snapshot) = self.records.lock().await.snapshot(&generation_id) else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Snapshot(e.to_string()))
        })?;

        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Snapshot(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;
        let path = dir.join(format!("{}.json", generation_id));
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Snapshot(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Snapshot(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;

        tracing::trace!(path = %path.display(), "Wrote generation snapshot");
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for LocalGateway {
    #[tracing::instrument(skip(self, config), fields(prompt_len = config.prompt().len()))]
    async fn create_generation(&self, config: &GenerationConfig) -> AtelierResult<GenerationId> {
        let id = GenerationId::from(uuid::Uuid::new_v4().to_string());
        self.records.lock().await.generations.insert(
            id.clone(),
            GenerationRecord {
                id: id.clone(),
                config: config.clone(),
                created_at: Utc::now(),
            },
        );
        tracing::info!(generation_id = %id, "Created generation");
        self.write_snapshot(Some(id.clone())).await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self, rendered_prompt))]
    async fn create_step(
        &self,
        generation_id: &GenerationId,
        rendered_prompt: &str,
    ) -> AtelierResult<StepId> {
        let id = {
            let mut records = self.records.lock().await;
            if !records.generations.contains_key(generation_id) {
                return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                    "generation {}",
                    generation_id
                )))
                .into());
            }
            records.last_step_id += 1;
            let id = StepId::new(records.last_step_id);
            let now = Utc::now();
            records.steps.insert(
                id,
                StepRecord {
                    id,
                    generation_id: generation_id.clone(),
                    rendered_prompt: rendered_prompt.to_string(),
                    status: Default::default(),
                    raw_output: String::new(),
                    usage: None,
                    cost: None,
                    error_message: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            id
        };
        tracing::debug!(step_id = %id, "Created step");
        self.write_snapshot(Some(generation_id.clone())).await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    async fn update_step(&self, step_id: StepId, update: StepUpdate) -> AtelierResult<()> {
        let generation_id = {
            let mut records = self.records.lock().await;
            let Some(step) = records.steps.get_mut(&step_id) else {
                return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                    "step {}",
                    step_id
                )))
                .into());
            };
            if !step.status.can_become(update.status) {
                return Err(PersistenceError::new(PersistenceErrorKind::RecordWrite(format!(
                    "step {} cannot move from {} to {}",
                    step_id, step.status, update.status
                )))
                .into());
            }
            step.status = update.status;
            step.raw_output = update.raw_output;
            if update.usage.is_some() {
                step.usage = update.usage;
            }
            if update.cost.is_some() {
                step.cost = update.cost;
            }
            if update.error_message.is_some() {
                step.error_message = update.error_message;
            }
            step.updated_at = Utc::now();
            step.generation_id.clone()
        };
        self.write_snapshot(Some(generation_id)).await
    }

    #[tracing::instrument(skip(self, body, render_error), fields(body_len = body.len()))]
    async fn create_artifact(
        &self,
        step_id: StepId,
        body: &str,
        render_error: Option<&ContentError>,
    ) -> AtelierResult<ArtifactId> {
        let (id, generation_id) = {
            let mut records = self.records.lock().await;
            let Some(generation_id) = records.generation_of_step(step_id) else {
                return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                    "step {}",
                    step_id
                )))
                .into());
            };
            records.last_artifact_id += 1;
            let id = ArtifactId::new(records.last_artifact_id);
            records.artifacts.insert(
                id,
                ArtifactRecord {
                    id,
                    step_id,
                    body: body.to_string(),
                    render_error: render_error.cloned(),
                    blobs: ArtifactBlobs::default(),
                    created_at: Utc::now(),
                },
            );
            (id, generation_id)
        };
        tracing::debug!(artifact_id = %id, "Created artifact");
        self.write_snapshot(Some(generation_id)).await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_artifact(&self, artifact_id: ArtifactId) -> AtelierResult<()> {
        let (record, generation_id) = {
            let mut records = self.records.lock().await;
            let generation_id = records.generation_of_artifact(artifact_id);
            let Some(record) = records.artifacts.remove(&artifact_id) else {
                return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                    "artifact {}",
                    artifact_id
                )))
                .into());
            };
            (record, generation_id)
        };

        let mut keys: Vec<&String> = [
            &record.blobs.body,
            &record.blobs.vector,
            &record.blobs.preview,
        ]
        .into_iter()
        .flatten()
        .collect();
        keys.dedup();
        for key in keys {
            if let Err(e) = self.blobs.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete blob of removed artifact");
            }
        }

        tracing::info!(artifact_id = %artifact_id, "Deleted artifact");
        self.write_snapshot(generation_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_input_image(
        &self,
        generation_id: &GenerationId,
        mime: &str,
    ) -> AtelierResult<ImageId> {
        let id = {
            let mut records = self.records.lock().await;
            if !records.generations.contains_key(generation_id) {
                return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                    "generation {}",
                    generation_id
                )))
                .into());
            }
            records.last_image_id += 1;
            let id = ImageId::new(records.last_image_id);
            records.input_images.insert(
                id,
                InputImageRecord {
                    id,
                    generation_id: generation_id.clone(),
                    mime: mime.to_string(),
                    storage_key: None,
                },
            );
            id
        };
        self.write_snapshot(Some(generation_id.clone())).await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_input_image(&self, image_id: ImageId) -> AtelierResult<()> {
        let record = self.records.lock().await.input_images.remove(&image_id);
        let Some(record) = record else {
            return Err(PersistenceError::new(PersistenceErrorKind::NotFound(format!(
                "input image {}",
                image_id
            )))
            .into());
        };
        if let Some(key) = &record.storage_key {
            if let Err(e) = self.blobs.delete(key).await {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Failed to delete blob of removed input image"
                );
            }
        }
        tracing::info!(image_id = %image_id, "Deleted input image");
        self.write_snapshot(Some(record.generation_id)).await
    }

    #[tracing::instrument(skip(self, owner, bytes), fields(owner = %owner, size = bytes.len()))]
    async fn upload_blob(
        &self,
        kind: BlobKind,
        owner: &BlobOwner,
        bytes: Vec<u8>,
    ) -> AtelierResult<String> {
        let key = storage_key(kind, owner);
        let content_type = match owner {
            BlobOwner::InputImage { image_id, .. } => self
                .records
                .lock()
                .await
                .input_images
                .get(image_id)
                .map(|image| image.mime.clone())
                .unwrap_or_else(|| kind.content_type().to_string()),
            BlobOwner::Artifact { .. } => kind.content_type().to_string(),
        };

        let stored = self
            .blobs
            .put(&key, &content_type, bytes)
            .await
            .map_err(|e| {
                PersistenceError::new(PersistenceErrorKind::BlobUpload(format!(
                    "{}: {}",
                    key,
                    e.summary()
                )))
            })?;

        let generation_id = {
            let mut records = self.records.lock().await;
            match owner {
                BlobOwner::Artifact { artifact_id, .. } => {
                    let generation_id = records.generation_of_artifact(*artifact_id);
                    if let Some(artifact) = records.artifacts.get_mut(artifact_id) {
                        let blobs = &mut artifact.blobs;
                        match kind {
                            BlobKind::RasterPreview => blobs.preview = Some(stored.key.clone()),
                            BlobKind::GridBody => blobs.body = Some(stored.key.clone()),
                            BlobKind::VectorBody => {
                                blobs.vector = Some(stored.key.clone());
                                blobs.body.get_or_insert_with(|| stored.key.clone());
                            }
                            BlobKind::InputImage => {}
                        }
                    }
                    generation_id
                }
                BlobOwner::InputImage { image_id, .. } => {
                    records.input_images.get_mut(image_id).map(|image| {
                        image.storage_key = Some(stored.key.clone());
                        image.generation_id.clone()
                    })
                }
            }
        };

        tracing::debug!(key = %stored.key, hash = %stored.content_hash, "Uploaded blob");
        self.write_snapshot(generation_id).await?;
        Ok(stored.key)
    }
}
