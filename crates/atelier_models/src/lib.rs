//! Streaming LLM provider adapters for Atelier.
//!
//! Every adapter implements [`AtelierDriver`](atelier_interface::AtelierDriver)
//! over plain HTTP with server-sent events:
//!
//! - **OpenAI-compatible** - `openai`, `xai`, `openrouter` and `custom`
//!   endpoints
//! - **Anthropic** - the Messages API
//! - **Google** - Gemini `streamGenerateContent`
//!
//! Callers pick an adapter by id through [`ProviderRegistry`].
//!
//! ```no_run
//! use atelier_core::{GenerateRequest, Input, Message, ProviderSettings};
//! use atelier_interface::StreamEvent;
//! use atelier_models::ProviderRegistry;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ProviderSettings::new("openai", "gpt-4o")
//!     .with_credential(std::env::var("OPENAI_API_KEY")?);
//! let driver = ProviderRegistry::with_defaults().build(&settings)?;
//! let request = GenerateRequest {
//!     messages: vec![Message::user(vec![Input::Text("Draw a cat".to_string())])],
//!     ..GenerateRequest::default()
//! };
//! let mut stream = driver.generate_stream(&request).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::TextDelta(text) = event? {
//!         print!("{}", text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod anthropic;
mod gemini;
mod metrics;
mod openai;
mod registry;
mod sse;
mod stream;
mod vendor;

pub use anthropic::{ANTHROPIC_BASE_URL, AnthropicDriver};
pub use gemini::{GEMINI_BASE_URL, GeminiDriver};
pub use metrics::{LlmMetrics, classify_error};
pub use openai::{OPENAI_BASE_URL, OPENROUTER_BASE_URL, OpenAiCompatibleDriver, XAI_BASE_URL};
pub use registry::{DriverFactory, ProviderRegistry};
pub use sse::{SseDecoder, SseEvent};
pub use vendor::parse_vendor_error;
