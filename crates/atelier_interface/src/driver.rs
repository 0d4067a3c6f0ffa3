//! Provider adapter contract.

use async_trait::async_trait;
use atelier_core::{GenerateRequest, Usage};
use atelier_error::AtelierResult;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of events produced by one provider call.
pub type EventStream = Pin<Box<dyn Stream<Item = AtelierResult<StreamEvent>> + Send>>;

/// Why generation stopped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// Model completed naturally
    #[default]
    Stop,
    /// Hit the token limit
    Length,
    /// Content was filtered
    ContentFilter,
    /// Other or unreported reason
    Other,
}

impl FinishReason {
    /// Map a vendor stop reason onto the shared set.
    ///
    /// ```
    /// use atelier_interface::FinishReason;
    ///
    /// assert_eq!(FinishReason::from_vendor("end_turn"), FinishReason::Stop);
    /// assert_eq!(FinishReason::from_vendor("MAX_TOKENS"), FinishReason::Length);
    /// ```
    pub fn from_vendor(reason: &str) -> Self {
        match reason.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" | "safety" | "recitation" | "refusal" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// One event of a provider stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Incremental text
    TextDelta(String),
    /// Stream completed; always the last event of a successful stream
    Finished {
        /// Final token usage
        usage: Usage,
        /// Stop reason
        finish_reason: FinishReason,
    },
}

/// Uniform streaming interface over a vendor API.
///
/// Implementations are built from provider settings by a registry; callers
/// never branch on the vendor.
#[async_trait]
pub trait AtelierDriver: Send + Sync {
    /// Provider name (e.g., "anthropic", "openai", "google").
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Open a streaming call.
    ///
    /// Errors raised before the first byte arrives are returned directly;
    /// later failures are yielded as stream items.
    async fn generate_stream(&self, req: &GenerateRequest) -> AtelierResult<EventStream>;
}
