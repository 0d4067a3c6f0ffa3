//! Generation configuration.

use crate::{Dimensions, Format, Pricing};
use atelier_error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which earlier steps are replayed to the provider.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryPolicy {
    /// Every prior (assistant, feedback) pair
    #[default]
    Full,
    /// Only the most recent pair
    #[strum(to_string = "last_only", serialize = "last")]
    LastOnly,
}

/// What to do after a step whose artifacts all failed to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationPolicy {
    /// Feed the failure back and keep refining
    #[default]
    ContinueWithFeedback,
    /// End the run successfully when a step renders nothing
    StopWhenNothingRenders,
}

/// Provider selection for a run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ProviderSettings {
    /// Registry key, e.g. `openai`
    provider_id: String,
    /// Vendor model id
    model_id: String,
    /// API key
    #[serde(skip_serializing, default)]
    credential: Option<String>,
    /// Base URL overriding the vendor default
    endpoint: Option<String>,
}

impl ProviderSettings {
    /// Settings without credential or endpoint.
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            credential: None,
            endpoint: None,
        }
    }

    /// Attach an API key.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Attach a base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Reference image sent with every step's first user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// MIME type, e.g. `image/png`
    pub mime: String,
    /// Encoded image bytes
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ReferenceImage {
    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// Everything needed to run one generation.
///
/// Prompts are stored already rendered; template substitution happens before
/// the configuration is built.
///
/// # Examples
///
/// ```
/// use atelier_core::{Dimensions, Format, GenerationConfig, HistoryPolicy, ProviderSettings};
///
/// let config = GenerationConfig::builder()
///     .prompt("a lighthouse at dusk")
///     .format(Format::Svg)
///     .dimensions(Dimensions::new(256, 256))
///     .provider(ProviderSettings::new("openai", "gpt-4o"))
///     .max_steps(3u32)
///     .initial_prompt("Draw a lighthouse at dusk as SVG.")
///     .refinement_prompt("Improve the drawing.")
///     .build()
///     .unwrap();
///
/// assert_eq!(*config.history(), HistoryPolicy::Full);
/// assert_eq!(*config.max_steps(), 3);
///
/// let invalid = GenerationConfig::builder()
///     .prompt("x")
///     .provider(ProviderSettings::new("openai", "gpt-4o"))
///     .max_steps(0u32)
///     .initial_prompt("x")
///     .refinement_prompt("x")
///     .build();
/// assert!(invalid.is_err());
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct GenerationConfig {
    /// What the user asked for
    prompt: String,
    /// Target format
    #[builder(default)]
    format: Format,
    /// Output size
    #[builder(default)]
    dimensions: Dimensions,
    /// Provider and model
    provider: ProviderSettings,
    /// Number of steps to run, at least one
    #[builder(default = "1")]
    max_steps: u32,
    /// History replay policy
    #[builder(default)]
    history: HistoryPolicy,
    /// Continuation policy
    #[builder(default)]
    continuation: ContinuationPolicy,
    /// Token prices
    #[builder(default)]
    pricing: Pricing,
    /// Rendered prompt for the first step
    initial_prompt: String,
    /// Rendered prompt appended to each feedback turn
    refinement_prompt: String,
    /// Reference images
    #[builder(default)]
    #[serde(default)]
    reference_images: Vec<ReferenceImage>,
    /// Completion token cap
    #[builder(default)]
    max_output_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    temperature: Option<f32>,
}

impl GenerationConfig {
    /// Creates a new generation config builder.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder::default()
    }
}

impl GenerationConfigBuilder {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, `max_steps` is zero,
    /// or a dimension is zero.
    pub fn build(&self) -> Result<GenerationConfig, ConfigError> {
        let config = self
            .build_internal()
            .map_err(|e| ConfigError::new(e.to_string()))?;
        if config.max_steps == 0 {
            return Err(ConfigError::new("max_steps must be at least 1"));
        }
        if *config.dimensions.width() == 0 || *config.dimensions.height() == 0 {
            return Err(ConfigError::new(format!(
                "dimensions must be positive, got {}",
                config.dimensions
            )));
        }
        Ok(config)
    }
}
