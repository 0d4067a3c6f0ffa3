//! Google Gemini `streamGenerateContent` over server-sent events.

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

/// Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Streaming driver for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiDriver {
    /// Driver against the public API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Use a different base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(&base_url.into());
        self
    }

    fn request_body(req: &GenerateRequest) -> GeminiRequest {
        let system: Vec<Part> = req
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .flat_map(|m| m.content.iter().filter_map(Part::from_input))
            .collect();
        GeminiRequest {
            contents: req
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(Content::from_message)
                .collect(),
            system_instruction: (!system.is_empty()).then_some(SystemInstruction { parts: system }),
            generation_config: GenerationSettings {
                max_output_tokens: req.max_tokens,
                temperature: req.temperature,
            },
        }
    }
}

#[async_trait]
impl AtelierDriver for GeminiDriver {
    fn provider_name(&self) -> &'static str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, req), fields(model = %self.model, messages = req.messages.len()))]
    async fn generate_stream(&self, req: &GenerateRequest) -> AtelierResult<EventStream> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        );
        debug!(url = %url, "Opening Gemini content stream");
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(req));
        open_stream("google", &self.model, request, GeminiDecoder::default()).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileRef,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRef {
    mime_type: String,
    file_uri: String,
}

impl Content {
    fn from_message(message: &Message) -> Self {
        let role = match message.role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            parts: message.content.iter().filter_map(Part::from_input).collect(),
        }
    }
}

impl Part {
    fn from_input(input: &Input) -> Option<Self> {
        if let Some(text) = input.as_text() {
            return Some(Part::Text {
                text: text.to_string(),
            });
        }
        if let Some((mime_type, data)) = inline_image(input) {
            return Some(Part::InlineData {
                inline_data: Blob { mime_type, data },
            });
        }
        let Input::Image { mime, .. } = input else {
            return None;
        };
        Some(Part::FileData {
            file_data: FileRef {
                mime_type: mime.clone().unwrap_or_else(|| "image/png".to_string()),
                file_uri: image_url(input)?.to_string(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Default)]
struct GeminiDecoder {
    usage: Usage,
    finish_reason: Option<FinishReason>,
}

impl ChunkDecoder for GeminiDecoder {
    fn decode(&mut self, event: &SseEvent) -> AtelierResult<Option<String>> {
        let data = event.data.trim();
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| malformed(data, e))?;
        if let Some(detail) = detail_from_value(&value) {
            return Err(ProviderError::new(ProviderErrorKind::Vendor(detail)).into());
        }
        let chunk: GeminiChunk = serde_json::from_value(value).map_err(|e| malformed(data, e))?;

        if let Some(usage) = chunk.usage_metadata {
            self.usage = Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            };
        }
        let mut text = String::new();
        // Only the first candidate is used.
        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(reason) = candidate.finish_reason {
                self.finish_reason = Some(FinishReason::from_vendor(&reason));
            }
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if !part.thought
                    && let Some(t) = part.text
                {
                    text.push_str(&t);
                }
            }
        }
        Ok(Some(text))
    }

    fn is_done(&self) -> bool {
        false
    }

    fn finish(self) -> AtelierResult<StreamEvent> {
        let Some(finish_reason) = self.finish_reason else {
            return Err(truncated());
        };
        Ok(StreamEvent::Finished {
            usage: self.usage,
            finish_reason,
        })
    }
}
