//! The multi-step refinement loop.

use crate::executor::{StepContext, StepExecutor, StepOutcome, cancelled, compensated};
use crate::feedback::Feedback;
use crate::history::StepHistoryEntry;
use crate::state::RunState;
use atelier_core::{ContinuationPolicy, GenerationConfig, GenerationId, ImageId, StepId};
use atelier_error::AtelierResult;
use atelier_interface::{BlobKind, BlobOwner, PersistenceGateway, Sanitizer};
use atelier_models::ProviderRegistry;
use atelier_render::{AllowListSanitizer, Renderer};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Generation id, if the generation record was created
    pub generation_id: Option<GenerationId>,
    /// Whether the run ended normally
    pub success: bool,
    /// Failure reason
    pub error: Option<String>,
}

/// What to do after a non-final step.
#[derive(Debug, Clone, PartialEq)]
enum Next {
    Continue(Feedback),
    Stop,
}

/// Drives a generation through up to `max_steps` refinement rounds.
///
/// Each run is sequential; steps never overlap. The orchestrator holds no
/// per-run state, so independent generations may share one instance. Live
/// progress of a run is published on the watch channel handed to
/// [`run_with_progress`](Self::run_with_progress).
pub struct RefinementOrchestrator {
    registry: Arc<ProviderRegistry>,
    gateway: Arc<dyn PersistenceGateway>,
    renderer: Arc<Renderer>,
    sanitizer: Arc<dyn Sanitizer>,
}

impl RefinementOrchestrator {
    /// Orchestrator resolving drivers through `registry`, using the
    /// allow-list sanitizer for vector markup.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        gateway: Arc<dyn PersistenceGateway>,
        renderer: Arc<Renderer>,
    ) -> Self {
        Self {
            registry,
            gateway,
            renderer,
            sanitizer: Arc::new(AllowListSanitizer::new()),
        }
    }

    /// Replace the markup sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Run a generation without observing its progress.
    pub async fn run(&self, config: &GenerationConfig, cancel: CancellationToken) -> RunResult {
        let (progress, _) = watch::channel(RunState::default());
        self.run_with_progress(config, cancel, progress).await
    }

    /// Run a generation to completion, failure or cancellation, publishing
    /// its live state into `progress`.
    ///
    /// The channel belongs to this run alone; it is reset on entry and left
    /// holding the final state. Never returns an error: every outcome is
    /// described by the [`RunResult`], and the failing step carries the
    /// reason.
    #[instrument(
        skip_all,
        fields(
            provider = %config.provider().provider_id(),
            model = %config.provider().model_id(),
            format = %config.format(),
            max_steps = config.max_steps()
        )
    )]
    pub async fn run_with_progress(
        &self,
        config: &GenerationConfig,
        cancel: CancellationToken,
        progress: watch::Sender<RunState>,
    ) -> RunResult {
        progress.send_replace(RunState::default());
        let mut generation_id = None;

        let result = match self
            .run_steps(config, &cancel, &progress, &mut generation_id)
            .await
        {
            Ok(()) => {
                info!(generation_id = ?generation_id, "Generation finished");
                RunResult {
                    generation_id,
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!(generation_id = ?generation_id, "Generation cancelled");
                } else {
                    error!(generation_id = ?generation_id, error = %e, "Generation failed");
                }
                RunResult {
                    generation_id,
                    success: false,
                    error: Some(e.summary()),
                }
            }
        };

        let reason = result.error.clone();
        progress.send_modify(|state| {
            state.finished = true;
            state.error = reason;
        });
        result
    }

    async fn run_steps(
        &self,
        config: &GenerationConfig,
        cancel: &CancellationToken,
        progress: &watch::Sender<RunState>,
        generation_slot: &mut Option<GenerationId>,
    ) -> AtelierResult<()> {
        let driver = self.registry.build(config.provider())?;
        let generation_id = self.gateway.create_generation(config).await?;
        *generation_slot = Some(generation_id.clone());
        let published = generation_id.clone();
        progress.send_modify(|state| state.generation_id = Some(published));
        info!(generation_id = %generation_id, "Generation created");

        self.upload_reference_images(&generation_id, config).await?;

        let executor = StepExecutor::new(
            driver,
            Arc::clone(&self.gateway),
            Arc::clone(&self.renderer),
            Arc::clone(&self.sanitizer),
        );
        let max_steps = *config.max_steps() as usize;
        let mut history: Vec<StepHistoryEntry> = Vec::new();
        let mut previous_step: Option<StepId> = None;

        for index in 0..max_steps {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            let outcome = executor
                .execute(StepContext {
                    config,
                    generation_id: &generation_id,
                    index,
                    history: &history,
                    previous_step,
                    state: progress,
                    cancel,
                })
                .await?;
            previous_step = Some(outcome.step_id);

            if index + 1 == max_steps {
                break;
            }
            match next_step(&outcome, *config.continuation()) {
                Next::Continue(feedback) => {
                    history.push(StepHistoryEntry::new(outcome.raw_output, feedback));
                }
                Next::Stop => {
                    info!(step = index, "Nothing rendered, stopping refinement");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Record then blob for each reference image; the record is deleted if
    /// its upload fails.
    async fn upload_reference_images(
        &self,
        generation_id: &GenerationId,
        config: &GenerationConfig,
    ) -> AtelierResult<Vec<ImageId>> {
        let mut uploaded = Vec::with_capacity(config.reference_images().len());
        for image in config.reference_images() {
            let image_id = self
                .gateway
                .create_input_image(generation_id, &image.mime)
                .await?;
            let owner = BlobOwner::InputImage {
                image_id,
                extension: image.extension().to_string(),
            };
            if let Err(e) = self
                .gateway
                .upload_blob(BlobKind::InputImage, &owner, image.bytes.clone())
                .await
            {
                warn!(
                    image_id = %image_id,
                    error = %e.summary(),
                    "Upload failed, deleting input image record"
                );
                let cleanup = self.gateway.delete_input_image(image_id).await;
                return Err(compensated(e, cleanup));
            }
            uploaded.push(image_id);
        }
        Ok(uploaded)
    }
}

fn next_step(outcome: &StepOutcome, policy: ContinuationPolicy) -> Next {
    let feedback = outcome.feedback();
    let nothing_rendered = matches!(&feedback, Feedback::Error(e) if !e.is_no_artifact());
    if nothing_rendered && policy == ContinuationPolicy::StopWhenNothingRenders {
        Next::Stop
    } else {
        Next::Continue(feedback)
    }
}
