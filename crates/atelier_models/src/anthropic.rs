//! Anthropic Messages API.

use crate::sse::SseEvent;
use crate::stream::{
    ChunkDecoder, image_url, inline_image, malformed, open_stream, trim_base, truncated,
};
use crate::vendor::detail_from_error;
use async_trait::async_trait;
use atelier_core::{GenerateRequest, Input, Message, Role, Usage};
use atelier_error::{AtelierResult, ProviderError, ProviderErrorKind};
use atelier_interface::{AtelierDriver, EventStream, FinishReason, StreamEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Streaming driver for Anthropic's `/messages` endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicDriver {
    /// Driver against the public API.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-5")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Use a different base URL, such as a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(&base_url.into());
        self
    }

    fn request_body<'a>(&'a self, req: &'a GenerateRequest) -> MessagesRequest<'a> {
        let system: Vec<String> = req
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
            .collect();
        MessagesRequest {
            model: req.model.as_deref().unwrap_or(&self.model),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: req
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(AnthropicMessage::from_message)
                .collect(),
            stream: true,
            temperature: req.temperature,
        }
    }
}

#[async_trait]
impl AtelierDriver for AnthropicDriver {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, req), fields(model = %self.model, messages = req.messages.len()))]
    async fn generate_stream(&self, req: &GenerateRequest) -> AtelierResult<EventStream> {
        let url = format!("{}/messages", self.base_url);
        debug!(url = %url, "Opening Anthropic message stream");
        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(req));
        open_stream("anthropic", &self.model, request, MessagesDecoder::default()).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

impl AnthropicMessage {
    fn from_message(message: &Message) -> Self {
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            content: message.content.iter().filter_map(ContentBlock::from_input).collect(),
        }
    }
}

impl ContentBlock {
    fn from_input(input: &Input) -> Option<Self> {
        if let Some(text) = input.as_text() {
            return Some(ContentBlock::Text {
                text: text.to_string(),
            });
        }
        let source = match inline_image(input) {
            Some((media_type, data)) => ImageSource::Base64 { media_type, data },
            None => ImageSource::Url {
                url: image_url(input)?.to_string(),
            },
        };
        Some(ContentBlock::Image { source })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagesEvent {
    MessageStart {
        message: StartedMessage,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        usage: Option<EventUsage>,
    },
    MessageStop,
    Error {
        error: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartedMessage {
    usage: Option<EventUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Default)]
struct MessagesDecoder {
    usage: Usage,
    finish_reason: Option<FinishReason>,
    done: bool,
}

impl MessagesDecoder {
    fn apply_usage(&mut self, usage: Option<EventUsage>) {
        let Some(usage) = usage else {
            return;
        };
        if let Some(input) = usage.input_tokens {
            self.usage.input_tokens = input;
        }
        // Output counts are cumulative.
        if let Some(output) = usage.output_tokens {
            self.usage.output_tokens = output;
        }
    }
}

impl ChunkDecoder for MessagesDecoder {
    fn decode(&mut self, event: &SseEvent) -> AtelierResult<Option<String>> {
        let data = event.data.trim();
        let parsed: MessagesEvent = serde_json::from_str(data).map_err(|e| malformed(data, e))?;
        match parsed {
            MessagesEvent::MessageStart { message } => self.apply_usage(message.usage),
            MessagesEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => return Ok(Some(text)),
            MessagesEvent::ContentBlockDelta { .. } => {}
            MessagesEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.finish_reason = Some(FinishReason::from_vendor(&reason));
                }
                self.apply_usage(usage);
            }
            MessagesEvent::MessageStop => self.done = true,
            MessagesEvent::Error { error } => {
                return Err(
                    ProviderError::new(ProviderErrorKind::Vendor(detail_from_error(&error))).into(),
                );
            }
            MessagesEvent::Other => {}
        }
        Ok(None)
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> AtelierResult<StreamEvent> {
        if !self.done {
            return Err(truncated());
        }
        Ok(StreamEvent::Finished {
            usage: self.usage,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Stop),
        })
    }
}
