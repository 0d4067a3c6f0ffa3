//! Test utilities for refinement loop tests.
//!
//! A scripted driver replays canned model output, and a fault-injecting
//! gateway wraps [`LocalGateway`] so persistence failures can be forced at
//! chosen points.

#![allow(dead_code)]

use async_trait::async_trait;
use atelier_core::{
    ArtifactId, ContentError, Dimensions, Format, GenerateRequest, GenerationConfig, GenerationId,
    ImageId, Pricing, ProviderSettings, StepId, StepUpdate, Usage,
};
use atelier_error::{
    AtelierResult, PersistenceError, PersistenceErrorKind, ProviderError, ProviderErrorKind,
};
use atelier_interface::{
    AtelierDriver, BlobKind, BlobOwner, EventStream, FinishReason, PersistenceGateway, StreamEvent,
};
use atelier_models::ProviderRegistry;
use atelier_refine::{PromptTemplates, RefinementOrchestrator};
use atelier_render::Renderer;
use atelier_storage::{LocalGateway, MemoryBlobStore};
use futures::{Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A small drawing that renders.
pub const GOOD_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><rect width="16" height="16" fill="#c33"/></svg>"##;

/// Markup with a mismatched closing tag on line 3.
pub const BROKEN_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"16\" height=\"16\">\n<g>\n<rect/></svg>";

/// Usage reported by every scripted reply.
pub const USAGE: Usage = Usage {
    input_tokens: 1_000,
    output_tokens: 500,
};

/// Wrap a body in a fenced block with some chatter around it.
pub fn fenced(tag: &str, body: &str) -> String {
    format!("Here is my drawing:\n```{}\n{}\n```\nHope you like it.", tag, body)
}

/// One scripted provider call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream the chunks, then finish
    Text(Vec<String>),
    /// Fail before the stream opens
    Reject(String),
    /// Stream the chunks, then yield an error
    Break(Vec<String>, String),
    /// Stream the chunks, then never finish
    Stall(Vec<String>),
}

impl Reply {
    /// Reply streaming `text` in three chunks.
    pub fn chunked(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let third = chars.len().div_ceil(3).max(1);
        Reply::Text(chars.chunks(third).map(|c| c.iter().collect()).collect())
    }
}

/// Driver answering each call with the next scripted reply. The last reply
/// repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedDriver {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedDriver {
    /// Driver with the given script.
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().expect("replies lock");
        let mut last = self.last.lock().expect("last lock");
        if let Some(reply) = replies.pop_front() {
            *last = Some(reply.clone());
            reply
        } else {
            last.clone().unwrap_or_else(|| Reply::Text(Vec::new()))
        }
    }
}

#[async_trait]
impl AtelierDriver for ScriptedDriver {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(&self, req: &GenerateRequest) -> AtelierResult<EventStream> {
        self.requests.lock().expect("requests lock").push(req.clone());
        let stream: EventStream = match self.next_reply() {
            Reply::Text(chunks) => deltas(chunks)
                .chain(futures::stream::once(async {
                    Ok(StreamEvent::Finished {
                        usage: USAGE,
                        finish_reason: FinishReason::Stop,
                    })
                }))
                .boxed(),
            Reply::Reject(message) => {
                return Err(ProviderError::new(ProviderErrorKind::Transport(message)).into());
            }
            Reply::Break(chunks, message) => deltas(chunks)
                .chain(futures::stream::once(async move {
                    Err(ProviderError::new(ProviderErrorKind::Stream(message)).into())
                }))
                .boxed(),
            Reply::Stall(chunks) => deltas(chunks).chain(futures::stream::pending()).boxed(),
        };
        Ok(stream)
    }
}

fn deltas(chunks: Vec<String>) -> impl Stream<Item = AtelierResult<StreamEvent>> + Send {
    futures::stream::iter(chunks.into_iter().map(|chunk| Ok(StreamEvent::TextDelta(chunk))))
}

/// Registry whose `mock` provider always resolves to `driver`.
pub fn registry_with(driver: Arc<ScriptedDriver>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(
        "mock",
        Arc::new(move |_settings: &ProviderSettings| {
            Ok(Arc::clone(&driver) as Arc<dyn AtelierDriver>)
        }),
    );
    Arc::new(registry)
}

/// Gateway that delegates to a [`LocalGateway`] but fails on request.
pub struct FaultyGateway {
    /// Wrapped gateway
    pub inner: LocalGateway,
    /// Blob store behind `inner`
    pub blobs: MemoryBlobStore,
    /// Uploads of this kind fail
    pub fail_upload: Option<BlobKind>,
    /// Artifact and image deletes fail
    pub fail_delete: bool,
    /// Step ids to hand out instead of the inner gateway's
    pub step_ids: Mutex<VecDeque<i64>>,
    aliases: Mutex<HashMap<StepId, StepId>>,
}

impl FaultyGateway {
    /// Gateway that never fails.
    pub fn new() -> Self {
        let blobs = MemoryBlobStore::new();
        Self {
            inner: LocalGateway::new(Arc::new(blobs.clone())),
            blobs,
            fail_upload: None,
            fail_delete: false,
            step_ids: Mutex::new(VecDeque::new()),
            aliases: Mutex::new(HashMap::new()),
        }
    }

    /// Fail every upload of `kind`.
    pub fn failing_upload(mut self, kind: BlobKind) -> Self {
        self.fail_upload = Some(kind);
        self
    }

    /// Fail compensating deletes.
    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    fn resolve(&self, step_id: StepId) -> StepId {
        self.aliases
            .lock()
            .expect("aliases lock")
            .get(&step_id)
            .copied()
            .unwrap_or(step_id)
    }

    /// Report these step ids, in order, regardless of what was stored.
    pub fn with_step_ids(self, ids: impl IntoIterator<Item = i64>) -> Self {
        *self.step_ids.lock().expect("step ids lock") = ids.into_iter().collect();
        self
    }
}

#[async_trait]
impl PersistenceGateway for FaultyGateway {
    async fn create_generation(&self, config: &GenerationConfig) -> AtelierResult<GenerationId> {
        self.inner.create_generation(config).await
    }

    async fn create_step(
        &self,
        generation_id: &GenerationId,
        rendered_prompt: &str,
    ) -> AtelierResult<StepId> {
        let stored = self.inner.create_step(generation_id, rendered_prompt).await?;
        let Some(forced) = self.step_ids.lock().expect("step ids lock").pop_front() else {
            return Ok(stored);
        };
        let forced = StepId::new(forced);
        self.aliases.lock().expect("aliases lock").insert(forced, stored);
        Ok(forced)
    }

    async fn update_step(&self, step_id: StepId, update: StepUpdate) -> AtelierResult<()> {
        self.inner.update_step(self.resolve(step_id), update).await
    }

    async fn create_artifact(
        &self,
        step_id: StepId,
        body: &str,
        render_error: Option<&ContentError>,
    ) -> AtelierResult<ArtifactId> {
        self.inner
            .create_artifact(self.resolve(step_id), body, render_error)
            .await
    }

    async fn delete_artifact(&self, artifact_id: ArtifactId) -> AtelierResult<()> {
        if self.fail_delete {
            return Err(PersistenceError::new(PersistenceErrorKind::RecordWrite(
                "delete refused".to_string(),
            ))
            .into());
        }
        self.inner.delete_artifact(artifact_id).await
    }

    async fn create_input_image(
        &self,
        generation_id: &GenerationId,
        mime: &str,
    ) -> AtelierResult<ImageId> {
        self.inner.create_input_image(generation_id, mime).await
    }

    async fn delete_input_image(&self, image_id: ImageId) -> AtelierResult<()> {
        if self.fail_delete {
            return Err(PersistenceError::new(PersistenceErrorKind::RecordWrite(
                "delete refused".to_string(),
            ))
            .into());
        }
        self.inner.delete_input_image(image_id).await
    }

    async fn upload_blob(
        &self,
        kind: BlobKind,
        owner: &BlobOwner,
        bytes: Vec<u8>,
    ) -> AtelierResult<String> {
        if self.fail_upload == Some(kind) {
            return Err(PersistenceError::new(PersistenceErrorKind::BlobUpload(format!(
                "{} refused",
                kind
            )))
            .into());
        }
        self.inner.upload_blob(kind, owner, bytes).await
    }
}

/// Configuration for the `mock` provider with the built-in templates.
pub fn config(format: Format, max_steps: u32) -> anyhow::Result<GenerationConfig> {
    config_builder(format, max_steps)
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// Builder pre-filled like [`config`], for tests that tweak policies.
pub fn config_builder(format: Format, max_steps: u32) -> atelier_core::GenerationConfigBuilder {
    let dimensions = Dimensions::new(64, 64);
    let (initial, refinement) =
        PromptTemplates::for_format(format).render("a red square", &dimensions);
    let mut builder = GenerationConfig::builder();
    builder
        .prompt("a red square")
        .format(format)
        .dimensions(dimensions)
        .provider(ProviderSettings::new("mock", "scripted"))
        .max_steps(max_steps)
        .pricing(Pricing::new(1.0, 2.0))
        .initial_prompt(initial)
        .refinement_prompt(refinement);
    builder
}

/// Orchestrator over `driver` and `gateway` without system fonts.
pub fn orchestrator(
    driver: Arc<ScriptedDriver>,
    gateway: Arc<FaultyGateway>,
) -> RefinementOrchestrator {
    RefinementOrchestrator::new(
        registry_with(driver),
        gateway,
        Arc::new(Renderer::without_system_fonts()),
    )
}
