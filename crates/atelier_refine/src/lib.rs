//! Multi-step generation and refinement for Atelier.
//!
//! A run asks a model for an artifact, renders what comes back, and feeds the
//! preview or the render failure into the next request, for a fixed number of
//! steps:
//!
//! - [`StepExecutor`] performs one round-trip: stream, extract, render,
//!   persist.
//! - [`RefinementOrchestrator`] sequences steps, builds each step's history
//!   and publishes a live [`RunState`].
//!
//! ```no_run
//! use atelier_core::{Format, GenerationConfig, ProviderSettings};
//! use atelier_models::ProviderRegistry;
//! use atelier_refine::{PromptTemplates, RefinementOrchestrator};
//! use atelier_render::Renderer;
//! use atelier_storage::{FileSystemBlobStore, LocalGateway};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dimensions = atelier_core::Dimensions::new(512, 512);
//! let (initial, refinement) = PromptTemplates::for_format(Format::Svg).render("a fox", &dimensions);
//! let config = GenerationConfig::builder()
//!     .prompt("a fox")
//!     .dimensions(dimensions)
//!     .provider(ProviderSettings::new("openai", "gpt-4o").with_credential("sk-..."))
//!     .max_steps(3u32)
//!     .initial_prompt(initial)
//!     .refinement_prompt(refinement)
//!     .build()?;
//!
//! let gateway = Arc::new(LocalGateway::new(Arc::new(FileSystemBlobStore::new("./atelier-data")?)));
//! let orchestrator = RefinementOrchestrator::new(
//!     Arc::new(ProviderRegistry::with_defaults()),
//!     gateway,
//!     Arc::new(Renderer::new()),
//! );
//! let result = orchestrator.run(&config, CancellationToken::new()).await;
//! println!("{:?}", result);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod feedback;
mod history;
mod orchestrator;
mod state;
mod templates;

pub use executor::{StepContext, StepExecutor, StepOutcome};
pub use feedback::{Feedback, PREVIEW_LEAD_IN, failure_text};
pub use history::{StepHistoryEntry, build_messages};
pub use orchestrator::{RefinementOrchestrator, RunResult};
pub use state::{RunState, StepState};
pub use templates::{
    ASCII_INITIAL_TEMPLATE, ASCII_REFINEMENT_TEMPLATE, PromptTemplates, SVG_INITIAL_TEMPLATE,
    SVG_REFINEMENT_TEMPLATE, render_template,
};
