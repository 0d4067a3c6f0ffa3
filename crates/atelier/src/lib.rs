//! Atelier - iterative LLM drawing
//!
//! Atelier asks a language model for a drawing, renders what it returns, and
//! shows the model its own result (or why it failed to render) so it can
//! improve it over several steps. Drawings are SVG markup or ASCII art.
//!
//! # Quick Start
//!
//! ```no_run
//! use atelier::{
//!     AtelierConfig, FileSystemBlobStore, GenerationConfig, LocalGateway, PromptTemplates,
//!     ProviderRegistry, RefinementOrchestrator, Dimensions, Format,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AtelierConfig::load()?;
//! let dimensions = Dimensions::new(512, 512);
//! let (initial, refinement) =
//!     PromptTemplates::for_format(Format::Svg).render("a lighthouse", &dimensions);
//! let generation = GenerationConfig::builder()
//!     .prompt("a lighthouse")
//!     .dimensions(dimensions)
//!     .provider(config.provider_settings("openai", "gpt-4o", None)?)
//!     .pricing(config.pricing("openai", "gpt-4o"))
//!     .max_steps(3u32)
//!     .initial_prompt(initial)
//!     .refinement_prompt(refinement)
//!     .build()?;
//!
//! let store = FileSystemBlobStore::new(config.storage.blob_dir())?;
//! let orchestrator = RefinementOrchestrator::new(
//!     Arc::new(ProviderRegistry::with_defaults()),
//!     Arc::new(LocalGateway::new(Arc::new(store))),
//!     Arc::new(config.renderer()),
//! );
//! let result = orchestrator.run(&generation, CancellationToken::new()).await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `atelier_error` - Error types
//! - `atelier_core` - Data model
//! - `atelier_interface` - Provider, persistence and sanitizer traits
//! - `atelier_models` - Streaming provider adapters
//! - `atelier_render` - Artifact extraction, sanitization and rendering
//! - `atelier_storage` - Blob stores and the local gateway
//! - `atelier_refine` - Step executor and refinement loop
//!
//! This crate re-exports everything and adds configuration and logging.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod logging;

pub use atelier_core::*;
pub use atelier_error::*;
pub use atelier_interface::*;
pub use atelier_models::{ProviderRegistry, classify_error, parse_vendor_error};
pub use atelier_refine::*;
pub use atelier_render::*;
pub use atelier_storage::{
    BlobStore, FileSystemBlobStore, GenerationSnapshot, LocalGateway, MemoryBlobStore,
    storage_key,
};

pub use crate::config::{
    AtelierConfig, DefaultsConfig, ModelConfig, ProviderConfig, RenderConfig, StorageConfig,
};
pub use crate::logging::init_logging;
