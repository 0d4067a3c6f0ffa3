//! Top-level error wrapper types.

use crate::{
    ConfigError, PersistenceError, ProviderError, RefineError, RefineErrorKind, RenderError,
    StorageError,
};

/// Every error the engine can raise, grouped by the layer that raised it.
///
/// # Examples
///
/// ```
/// use atelier_error::{AtelierError, ConfigError};
///
/// let err: AtelierError = ConfigError::new("missing model").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum AtelierErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Blob storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Provider adapter error
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Persistence gateway error
    #[from(PersistenceError)]
    Persistence(PersistenceError),
    /// Renderer infrastructure error
    #[from(RenderError)]
    Render(RenderError),
    /// Refinement loop error
    #[from(RefineError)]
    Refine(RefineError),
}

/// Atelier error with kind discrimination.
///
/// # Examples
///
/// ```
/// use atelier_error::{AtelierResult, RefineError, RefineErrorKind};
///
/// fn might_fail() -> AtelierResult<()> {
///     Err(RefineError::new(RefineErrorKind::Cancelled))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(err.is_cancelled());
/// assert_eq!(err.summary(), "Generation cancelled");
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Atelier Error: {}", _0)]
pub struct AtelierError(Box<AtelierErrorKind>);

impl AtelierError {
    /// Create a new error from a kind.
    pub fn new(kind: AtelierErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AtelierErrorKind {
        &self.0
    }

    /// Whether the run was stopped by its caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.kind(),
            AtelierErrorKind::Refine(RefineError {
                kind: RefineErrorKind::Cancelled,
                ..
            })
        )
    }

    /// Message without source location, suitable for persisting on a step
    /// or returning to a caller.
    pub fn summary(&self) -> String {
        match self.kind() {
            AtelierErrorKind::Config(e) => e.message.clone(),
            AtelierErrorKind::Storage(e) => e.kind.to_string(),
            AtelierErrorKind::Provider(e) => e.kind.to_string(),
            AtelierErrorKind::Persistence(e) => e.kind.to_string(),
            AtelierErrorKind::Render(e) => e.kind.to_string(),
            AtelierErrorKind::Refine(e) => e.kind.to_string(),
        }
    }
}

// Generic From implementation for any type that converts to AtelierErrorKind
impl<T> From<T> for AtelierError
where
    T: Into<AtelierErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Atelier operations.
pub type AtelierResult<T> = std::result::Result<T, AtelierError>;
