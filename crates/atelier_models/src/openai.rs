//! OpenAI-compatible chat completions.
//!
//! Serves OpenAI itself and every vendor that mirrors its streaming API
//! (xAI, OpenRouter, self-hosted gateways).

use crate::sse::SseEvent;
use crate::stream::{
    ChunkDecoder, image_url, inline_image, malformed, open_stream, trim_base, truncated,
};
use crate::vendor::detail_from_value;
use async_trait::async_trait;
use atelier_core::{GenerateRequest, Input, Message, Role, Usage};
use atelier_error::{AtelierResult, ProviderError, ProviderErrorKind};
use atelier_interface::{AtelierDriver, EventStream, FinishReason, StreamEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// xAI API base URL.
pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";
/// OpenRouter API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Streaming driver for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleDriver {
    client: reqwest::Client,
    provider: &'static str,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleDriver {
    /// Driver for `provider` at `base_url`. Requests are unauthenticated when
    /// `api_key` is `None`.
    pub fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            base_url: trim_base(&base_url.into()),
            api_key,
            model: model.into(),
        }
    }

    fn request_body<'a>(&'a self, req: &'a GenerateRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: req.model.as_deref().unwrap_or(&self.model),
            messages: req.messages.iter().map(ChatMessage::from_message).collect(),
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        }
    }
}

#[async_trait]
impl AtelierDriver for OpenAiCompatibleDriver {
    fn provider_name(&self) -> &'static str {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(
        skip(self, req),
        fields(provider = self.provider, model = %self.model, messages = req.messages.len())
    )]
    async fn generate_stream(&self, req: &GenerateRequest) -> AtelierResult<EventStream> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, "Opening chat completion stream");
        let mut request = self.client.post(&url).json(&self.request_body(req));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        open_stream(self.provider, &self.model, request, ChatDecoder::default()).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

impl ChatMessage {
    fn from_message(message: &Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        // Only user turns may carry images; others are sent as plain strings.
        let content = if message.role == Role::User && message.image_count() > 0 {
            ChatContent::Parts(message.content.iter().filter_map(ChatPart::from_input).collect())
        } else {
            ChatContent::Text(message.text())
        };
        Self { role, content }
    }
}

impl ChatPart {
    fn from_input(input: &Input) -> Option<Self> {
        if let Some(text) = input.as_text() {
            return Some(ChatPart::Text {
                text: text.to_string(),
            });
        }
        let url = match inline_image(input) {
            Some((mime, data)) => format!("data:{};base64,{}", mime, data),
            None => image_url(input)?.to_string(),
        };
        Some(ChatPart::ImageUrl {
            image_url: ImageUrl { url },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Default)]
struct ChatDecoder {
    usage: Usage,
    finish_reason: Option<FinishReason>,
    done: bool,
}

impl ChunkDecoder for ChatDecoder {
    fn decode(&mut self, event: &SseEvent) -> AtelierResult<Option<String>> {
        let data = event.data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| malformed(data, e))?;
        if let Some(detail) = detail_from_value(&value) {
            return Err(ProviderError::new(ProviderErrorKind::Vendor(detail)).into());
        }
        let chunk: ChatChunk = serde_json::from_value(value).map_err(|e| malformed(data, e))?;

        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }
        let mut text = String::new();
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_vendor(&reason));
            }
            if let Some(content) = choice.delta.and_then(|d| d.content) {
                text.push_str(&content);
            }
        }
        Ok(Some(text))
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> AtelierResult<StreamEvent> {
        if !self.done && self.finish_reason.is_none() {
            return Err(truncated());
        }
        Ok(StreamEvent::Finished {
            usage: self.usage,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Stop),
        })
    }
}
