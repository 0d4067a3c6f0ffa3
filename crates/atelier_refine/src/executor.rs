//! One provider round-trip: stream, extract, render, persist.

use crate::feedback::Feedback;
use crate::history::{StepHistoryEntry, build_messages};
use crate::state::{RunState, StepState};
use atelier_core::{
    Artifact, ArtifactBlobs, ContentError, Cost, Dimensions, Format, GenerateRequest,
    GenerationConfig, GenerationId, StepId, StepStatus, StepUpdate, Usage,
};
use atelier_error::{
    AtelierError, AtelierResult, PersistenceError, PersistenceErrorKind, ProviderError,
    ProviderErrorKind, RefineError, RefineErrorKind, RenderError, RenderErrorKind,
};
use atelier_interface::{
    AtelierDriver, BlobKind, BlobOwner, PersistenceGateway, Sanitizer, StreamEvent,
};
use atelier_render::{RenderOutcome, Renderer, extract_artifacts};
use futures::StreamExt;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Inputs of one step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Run configuration
    pub config: &'a GenerationConfig,
    /// Owning generation
    pub generation_id: &'a GenerationId,
    /// Zero-based step index
    pub index: usize,
    /// Finished steps to replay
    pub history: &'a [StepHistoryEntry],
    /// Id of the previous step, which the new id must exceed
    pub previous_step: Option<StepId>,
    /// Live state to publish into
    pub state: &'a watch::Sender<RunState>,
    /// Stops the step while streaming
    pub cancel: &'a CancellationToken,
}

/// A completed and persisted step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Persisted step id
    pub step_id: StepId,
    /// Full model output
    pub raw_output: String,
    /// Persisted artifacts in extraction order
    pub artifacts: Vec<Artifact>,
    /// Final token usage
    pub usage: Usage,
    /// Cost of the step
    pub cost: Cost,
}

impl StepOutcome {
    /// Whether any artifact rendered.
    pub fn any_rendered(&self) -> bool {
        self.artifacts.iter().any(Artifact::is_rendered)
    }

    /// Preview of the last artifact that rendered.
    pub fn last_preview(&self) -> Option<&[u8]> {
        self.artifacts
            .iter()
            .rev()
            .find_map(|artifact| artifact.preview().as_deref())
    }

    /// Content error of the last artifact that failed.
    pub fn last_error(&self) -> Option<&ContentError> {
        self.artifacts
            .iter()
            .rev()
            .find_map(|artifact| artifact.render_error().as_ref())
    }

    /// What the next step is told about this one: the last good preview,
    /// else the last content error, else that nothing was found.
    pub fn feedback(&self) -> Feedback {
        if let Some(png) = self.last_preview() {
            Feedback::Preview(png.to_vec())
        } else if let Some(error) = self.last_error() {
            Feedback::Error(error.clone())
        } else {
            Feedback::no_artifact()
        }
    }
}

/// Runs single steps against a driver, a gateway and a renderer.
#[derive(Clone)]
pub struct StepExecutor {
    driver: Arc<dyn AtelierDriver>,
    gateway: Arc<dyn PersistenceGateway>,
    renderer: Arc<Renderer>,
    sanitizer: Arc<dyn Sanitizer>,
}

impl StepExecutor {
    /// Executor over the given collaborators.
    pub fn new(
        driver: Arc<dyn AtelierDriver>,
        gateway: Arc<dyn PersistenceGateway>,
        renderer: Arc<Renderer>,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Self {
        Self {
            driver,
            gateway,
            renderer,
            sanitizer,
        }
    }

    /// Run one step to completion.
    ///
    /// On any failure the step is marked failed, best effort, and the error
    /// is returned.
    ///
    /// # Errors
    ///
    /// Provider, persistence and renderer faults, and cancellation.
    #[instrument(skip_all, fields(generation_id = %ctx.generation_id, step = ctx.index))]
    pub async fn execute(&self, ctx: StepContext<'_>) -> AtelierResult<StepOutcome> {
        let rendered_prompt = if ctx.index == 0 {
            ctx.config.initial_prompt()
        } else {
            ctx.config.refinement_prompt()
        };
        ctx.state.send_modify(|state| {
            state.steps.push(StepState::pending(ctx.index, rendered_prompt.clone()));
        });

        let mut step_id = None;
        let mut raw = String::new();
        match self.run(ctx, rendered_prompt, &mut step_id, &mut raw).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.mark_failed(ctx.state, step_id, &raw, &e).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        ctx: StepContext<'_>,
        rendered_prompt: &str,
        step_slot: &mut Option<StepId>,
        raw: &mut String,
    ) -> AtelierResult<StepOutcome> {
        let messages = build_messages(ctx.config, ctx.history);
        let step_id = self
            .gateway
            .create_step(ctx.generation_id, rendered_prompt)
            .await?;
        *step_slot = Some(step_id);
        if let Some(previous) = ctx.previous_step
            && step_id <= previous
        {
            return Err(PersistenceError::new(PersistenceErrorKind::NonMonotonicStep {
                previous: previous.get(),
                next: step_id.get(),
            })
            .into());
        }

        self.gateway
            .update_step(step_id, StepUpdate::status(StepStatus::Generating))
            .await?;
        ctx.state.send_modify(|state| {
            if let Some(step) = state.current_step_mut() {
                step.step_id = Some(step_id);
                step.status = StepStatus::Generating;
            }
        });
        info!(step_id = %step_id, messages = messages.len(), "Step generating");

        let format = *ctx.config.format();
        let request = GenerateRequest {
            messages,
            max_tokens: *ctx.config.max_output_tokens(),
            temperature: *ctx.config.temperature(),
            model: None,
        };
        let usage = self.stream(ctx, &request, format, raw).await?;

        let bodies = self.extract(raw, format);
        let rendered = self.render_all(bodies, format, *ctx.config.dimensions()).await?;
        let cost = ctx.config.pricing().cost(&usage);
        self.gateway
            .update_step(step_id, StepUpdate::completed(raw.clone(), usage, cost))
            .await?;
        let live = rendered.clone();
        ctx.state.send_modify(|state| {
            if let Some(step) = state.current_step_mut() {
                step.status = StepStatus::Completed;
                step.artifacts = live;
                step.usage = Some(usage);
                step.cost = Some(cost);
            }
        });

        let artifacts = self
            .persist_all(ctx.generation_id, step_id, format, ctx.config.dimensions(), rendered)
            .await?;
        let published = artifacts.clone();
        ctx.state.send_modify(|state| {
            if let Some(step) = state.current_step_mut() {
                step.artifacts = published;
            }
        });
        info!(
            step_id = %step_id,
            artifacts = artifacts.len(),
            rendered = artifacts.iter().filter(|a| a.is_rendered()).count(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost = cost.total(),
            "Step completed"
        );

        Ok(StepOutcome {
            step_id,
            raw_output: raw.clone(),
            artifacts,
            usage,
            cost,
        })
    }

    /// Consume the provider stream, publishing each delta.
    async fn stream(
        &self,
        ctx: StepContext<'_>,
        request: &GenerateRequest,
        format: Format,
        raw: &mut String,
    ) -> AtelierResult<Usage> {
        let mut events = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(cancelled()),
            opened = self.driver.generate_stream(request) => opened?,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(cancelled()),
                next = events.next() => next,
            };
            match next {
                Some(Ok(StreamEvent::TextDelta(text))) => {
                    raw.push_str(&text);
                    let live: Vec<Artifact> = self
                        .extract(raw, format)
                        .into_iter()
                        .enumerate()
                        .map(|(index, body)| Artifact::pending(index, body))
                        .collect();
                    debug!(bytes = raw.len(), artifacts = live.len(), "Stream delta");
                    ctx.state.send_modify(|state| {
                        if let Some(step) = state.current_step_mut() {
                            step.raw_output.push_str(&text);
                            step.artifacts = live;
                        }
                    });
                }
                Some(Ok(StreamEvent::Finished {
                    usage,
                    finish_reason,
                })) => {
                    debug!(%finish_reason, "Stream finished");
                    return Ok(usage);
                }
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ProviderError::new(ProviderErrorKind::Stream(
                        "Stream closed without a final event".to_string(),
                    ))
                    .into());
                }
            }
        }
    }

    /// Candidate bodies in `raw`; vector markup is sanitized.
    fn extract(&self, raw: &str, format: Format) -> Vec<String> {
        extract_artifacts(raw, format)
            .into_iter()
            .map(|artifact| match format {
                Format::Svg => self.sanitizer.sanitize(&artifact.body),
                Format::Ascii => artifact.body,
            })
            .collect()
    }

    /// Render every body on the blocking pool.
    async fn render_all(
        &self,
        bodies: Vec<String>,
        format: Format,
        dimensions: Dimensions,
    ) -> AtelierResult<Vec<Artifact>> {
        let tasks = bodies.into_iter().enumerate().map(|(index, body)| {
            let renderer = Arc::clone(&self.renderer);
            async move {
                let input = body.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    renderer.render(&input, format, &dimensions)
                })
                .await
                .map_err(|e| RenderError::new(RenderErrorKind::Worker(e.to_string())))??;
                let artifact = Artifact::pending(index, body);
                Ok::<Artifact, AtelierError>(match outcome {
                    RenderOutcome::Rendered { png, .. } => artifact.rendered(png),
                    RenderOutcome::Failed(error) => {
                        debug!(index, error = %error, "Artifact did not render");
                        artifact.failed(error)
                    }
                })
            }
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn persist_all(
        &self,
        generation_id: &GenerationId,
        step_id: StepId,
        format: Format,
        dimensions: &Dimensions,
        artifacts: Vec<Artifact>,
    ) -> AtelierResult<Vec<Artifact>> {
        let tasks = artifacts.into_iter().map(|artifact| {
            self.persist_one(generation_id, step_id, format, dimensions, artifact)
        });
        join_all(tasks).await.into_iter().collect()
    }

    /// Record then blobs; the record is deleted if any upload fails.
    async fn persist_one(
        &self,
        generation_id: &GenerationId,
        step_id: StepId,
        format: Format,
        dimensions: &Dimensions,
        artifact: Artifact,
    ) -> AtelierResult<Artifact> {
        let artifact_id = self
            .gateway
            .create_artifact(step_id, artifact.body(), artifact.render_error().as_ref())
            .await?;
        let owner = BlobOwner::Artifact {
            generation_id: generation_id.clone(),
            step_id,
            artifact_id,
        };

        match self.upload_blobs(&owner, format, dimensions, &artifact).await {
            Ok(blobs) => Ok(artifact.persisted(artifact_id, blobs)),
            Err(e) => {
                warn!(
                    artifact_id = %artifact_id,
                    error = %e.summary(),
                    "Upload failed, deleting artifact record"
                );
                let cleanup = self.gateway.delete_artifact(artifact_id).await;
                Err(compensated(e, cleanup))
            }
        }
    }

    async fn upload_blobs(
        &self,
        owner: &BlobOwner,
        format: Format,
        dimensions: &Dimensions,
        artifact: &Artifact,
    ) -> AtelierResult<ArtifactBlobs> {
        let mut blobs = ArtifactBlobs::default();
        let body = artifact.body().as_bytes().to_vec();
        match format {
            Format::Svg => {
                let key = self
                    .gateway
                    .upload_blob(BlobKind::VectorBody, owner, body)
                    .await?;
                blobs.body = Some(key.clone());
                blobs.vector = Some(key);
            }
            Format::Ascii => {
                blobs.body = Some(
                    self.gateway
                        .upload_blob(BlobKind::GridBody, owner, body)
                        .await?,
                );
                let markup = self.renderer.grid_markup(artifact.body(), dimensions);
                blobs.vector = Some(
                    self.gateway
                        .upload_blob(BlobKind::VectorBody, owner, markup.into_bytes())
                        .await?,
                );
            }
        }
        if let Some(png) = artifact.preview() {
            blobs.preview = Some(
                self.gateway
                    .upload_blob(BlobKind::RasterPreview, owner, png.clone())
                    .await?,
            );
        }
        Ok(blobs)
    }

    async fn mark_failed(
        &self,
        state: &watch::Sender<RunState>,
        step_id: Option<StepId>,
        raw: &str,
        error: &AtelierError,
    ) {
        let message = error.summary();
        state.send_modify(|state| {
            if let Some(step) = state.current_step_mut() {
                step.status = StepStatus::Failed;
                step.error = Some(message.clone());
            }
        });
        error!(step_id = ?step_id.map(|id| id.get()), error = %message, "Step failed");

        let Some(step_id) = step_id else {
            return;
        };
        if let Err(e) = self
            .gateway
            .update_step(step_id, StepUpdate::failed(raw, message))
            .await
        {
            warn!(step_id = %step_id, error = %e.summary(), "Could not mark step failed");
        }
    }
}

pub(crate) fn cancelled() -> AtelierError {
    RefineError::new(RefineErrorKind::Cancelled).into()
}

/// The error to surface after a compensating delete.
pub(crate) fn compensated(primary: AtelierError, cleanup: AtelierResult<()>) -> AtelierError {
    match cleanup {
        Ok(()) => primary,
        Err(cleanup) => {
            error!(
                error = %primary.summary(),
                cleanup = %cleanup.summary(),
                "Compensating delete failed"
            );
            PersistenceError::new(PersistenceErrorKind::Compensation(format!(
                "{} (while undoing: {})",
                cleanup.summary(),
                primary.summary()
            )))
            .into()
        }
    }
}
