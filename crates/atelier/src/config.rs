//! Layered configuration.
//!
//! Values are merged from, in increasing precedence:
//! - the bundled `atelier.toml`
//! - `~/.config/atelier/atelier.toml`
//! - `./atelier.toml`
//!
//! Credentials are never stored in these files; each provider names the
//! environment variable holding its key.

use atelier_core::{Dimensions, Format, HistoryPolicy, Pricing, ProviderSettings};
use atelier_error::{AtelierResult, ConfigError};
use atelier_render::{AsciiStyle, DEFAULT_MAX_SIDE, Renderer};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../atelier.toml");

/// Values used when the command line leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Provider id
    pub provider: String,
    /// Model id
    pub model: String,
    /// Target format
    pub format: Format,
    /// Vector width in pixels
    pub width: u32,
    /// Vector height in pixels
    pub height: u32,
    /// Character grid width in columns
    pub ascii_width: u32,
    /// Character grid height in lines
    pub ascii_height: u32,
    /// Steps per run
    pub max_steps: u32,
    /// History replay policy
    pub history: HistoryPolicy,
    /// Completion token cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            format: Format::Svg,
            width: 512,
            height: 512,
            ascii_width: 80,
            ascii_height: 24,
            max_steps: 3,
            history: HistoryPolicy::Full,
            max_output_tokens: None,
        }
    }
}

impl DefaultsConfig {
    /// Default output size for `format`.
    pub fn dimensions(&self, format: Format) -> Dimensions {
        match format {
            Format::Svg => Dimensions::new(self.width, self.height),
            Format::Ascii => Dimensions::new(self.ascii_width, self.ascii_height),
        }
    }
}

/// Token prices of one model, in dollars per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelConfig {
    /// Input price
    #[serde(default)]
    pub input_price: f64,
    /// Output price
    #[serde(default)]
    pub output_price: f64,
}

/// Settings of one provider.
///
/// ```toml
/// [providers.openai]
/// api_key_env = "OPENAI_API_KEY"
///
/// [providers.openai.models."gpt-4o"]
/// input_price = 2.5
/// output_price = 10.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Base URL overriding the vendor default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Local pricing table
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

/// Where blobs and record snapshots go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory
    pub dir: PathBuf,
    /// Whether to write a JSON snapshot per generation
    pub snapshots: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("atelier-data"),
            snapshots: true,
        }
    }
}

impl StorageConfig {
    /// Directory holding blobs.
    pub fn blob_dir(&self) -> PathBuf {
        self.dir.join("blobs")
    }

    /// Directory holding generation snapshots.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.dir.join("generations")
    }
}

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Character-grid style
    pub ascii_style: AsciiStyle,
    /// Lines shown around a failing line
    pub context_lines: usize,
    /// Largest canvas side accepted
    pub max_side: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ascii_style: AsciiStyle::Crt,
            context_lines: 2,
            max_side: DEFAULT_MAX_SIDE,
        }
    }
}

/// Top-level Atelier configuration.
///
/// # Example
///
/// ```no_run
/// use atelier::AtelierConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AtelierConfig::load()?;
/// let pricing = config.pricing("openai", "gpt-4o");
/// println!("{} per million input tokens", pricing.input_per_million);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AtelierConfig {
    /// Command-line defaults
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Provider settings keyed by provider id
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Storage location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Renderer settings
    #[serde(default)]
    pub render: RenderConfig,
}

impl AtelierConfig {
    /// Load the bundled defaults overlaid with user files.
    ///
    /// User files are optional and skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed.
    #[instrument]
    pub fn load() -> AtelierResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/atelier/atelier.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }
        builder = builder.add_source(File::with_name("atelier").required(false));

        deserialize(builder)
    }

    /// Load the bundled defaults overlaid with one specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> AtelierResult<Self> {
        debug!("Loading configuration from file");
        deserialize(
            Config::builder()
                .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
                .add_source(File::from(path.as_ref())),
        )
    }

    /// Parse a TOML document on its own, without the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed.
    pub fn from_toml(toml: &str) -> AtelierResult<Self> {
        deserialize(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// Local price of a model; zero when unlisted.
    pub fn pricing(&self, provider: &str, model: &str) -> Pricing {
        self.providers
            .get(provider)
            .and_then(|p| p.models.get(model))
            .map(|m| Pricing::new(m.input_price, m.output_price))
            .unwrap_or_default()
    }

    /// API key of a provider, read from its configured environment variable.
    pub fn credential(&self, provider: &str) -> Option<String> {
        let var = self.providers.get(provider)?.api_key_env.as_ref()?;
        std::env::var(var).ok().filter(|key| !key.is_empty())
    }

    /// Provider settings for a run.
    ///
    /// `endpoint` overrides the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not configured.
    pub fn provider_settings(
        &self,
        provider: &str,
        model: &str,
        endpoint: Option<&str>,
    ) -> AtelierResult<ProviderSettings> {
        let Some(config) = self.providers.get(provider) else {
            return Err(ConfigError::new(format!(
                "Provider '{}' is not configured; known providers: {}",
                provider,
                self.providers.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
            .into());
        };

        let mut settings = ProviderSettings::new(provider, model);
        if let Some(key) = self.credential(provider) {
            settings = settings.with_credential(key);
        }
        if let Some(endpoint) = endpoint.or(config.endpoint.as_deref()) {
            settings = settings.with_endpoint(endpoint);
        }
        Ok(settings)
    }

    /// Renderer configured from the `[render]` section.
    pub fn renderer(&self) -> Renderer {
        Renderer::new()
            .with_ascii_style(self.render.ascii_style)
            .with_context_radius(self.render.context_lines)
            .with_max_side(self.render.max_side)
    }
}

fn deserialize(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> AtelierResult<AtelierConfig> {
    builder
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)).into())
}
