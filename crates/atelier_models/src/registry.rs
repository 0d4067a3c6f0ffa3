//! Provider lookup by id.

use crate::anthropic::AnthropicDriver;
use crate::gemini::GeminiDriver;
use crate::openai::{
    OPENAI_BASE_URL, OPENROUTER_BASE_URL, OpenAiCompatibleDriver, XAI_BASE_URL,
};
use atelier_core::ProviderSettings;
use atelier_error::{AtelierResult, ProviderError, ProviderErrorKind};
use atelier_interface::AtelierDriver;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a driver from run settings.
pub type DriverFactory =
    Arc<dyn Fn(&ProviderSettings) -> AtelierResult<Arc<dyn AtelierDriver>> + Send + Sync>;

/// Maps provider ids to driver factories.
///
/// # Examples
///
/// ```
/// use atelier_core::ProviderSettings;
/// use atelier_models::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_defaults();
/// let settings = ProviderSettings::new("anthropic", "claude-sonnet-4-5").with_credential("sk-test");
/// let driver = registry.build(&settings).unwrap();
/// assert_eq!(driver.provider_name(), "anthropic");
/// assert_eq!(driver.model_name(), "claude-sonnet-4-5");
///
/// assert!(registry.build(&ProviderSettings::new("acme", "m")).is_err());
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers: `openai`, `anthropic`,
    /// `google`, `xai`, `openrouter` and `custom`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("openai", openai_compatible("openai", Some(OPENAI_BASE_URL)));
        registry.register("xai", openai_compatible("xai", Some(XAI_BASE_URL)));
        registry.register(
            "openrouter",
            openai_compatible("openrouter", Some(OPENROUTER_BASE_URL)),
        );
        registry.register("custom", openai_compatible("custom", None));
        registry.register(
            "anthropic",
            Arc::new(|settings: &ProviderSettings| {
                let mut driver =
                    AnthropicDriver::new(require_credential(settings)?, settings.model_id());
                if let Some(endpoint) = settings.endpoint() {
                    driver = driver.with_base_url(endpoint);
                }
                Ok(Arc::new(driver) as Arc<dyn AtelierDriver>)
            }),
        );
        registry.register(
            "google",
            Arc::new(|settings: &ProviderSettings| {
                let mut driver =
                    GeminiDriver::new(require_credential(settings)?, settings.model_id());
                if let Some(endpoint) = settings.endpoint() {
                    driver = driver.with_base_url(endpoint);
                }
                Ok(Arc::new(driver) as Arc<dyn AtelierDriver>)
            }),
        );
        registry
    }

    /// Register or replace the factory for `id`.
    pub fn register(&mut self, id: impl Into<String>, factory: DriverFactory) {
        self.factories.insert(id.into(), factory);
    }

    /// Registered provider ids, sorted.
    pub fn providers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Build the driver selected by `settings`.
    ///
    /// # Errors
    ///
    /// Fails for an unknown provider id, or when the provider needs a
    /// credential or endpoint that `settings` lacks.
    #[tracing::instrument(
        skip(self, settings),
        fields(provider = %settings.provider_id(), model = %settings.model_id())
    )]
    pub fn build(&self, settings: &ProviderSettings) -> AtelierResult<Arc<dyn AtelierDriver>> {
        let factory = self.factories.get(settings.provider_id()).ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::UnknownProvider(
                settings.provider_id().clone(),
            ))
        })?;
        factory(settings)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

fn require_credential(settings: &ProviderSettings) -> AtelierResult<String> {
    settings
        .credential()
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::MissingCredential(
                settings.provider_id().clone(),
            ))
            .into()
        })
}

/// Factory for an OpenAI-compatible vendor. Without a default base URL the
/// endpoint is mandatory and the credential optional.
fn openai_compatible(provider: &'static str, default_base: Option<&'static str>) -> DriverFactory {
    Arc::new(move |settings: &ProviderSettings| {
        let driver = match default_base {
            Some(base) => OpenAiCompatibleDriver::new(
                provider,
                settings.endpoint().as_deref().unwrap_or(base),
                Some(require_credential(settings)?),
                settings.model_id(),
            ),
            None => {
                let endpoint = settings.endpoint().clone().ok_or_else(|| {
                    ProviderError::new(ProviderErrorKind::MissingEndpoint(provider.to_string()))
                })?;
                OpenAiCompatibleDriver::new(
                    provider,
                    endpoint,
                    settings.credential().clone(),
                    settings.model_id(),
                )
            }
        };
        Ok(Arc::new(driver) as Arc<dyn AtelierDriver>)
    })
}
