//! Configuration error types.

/// Configuration error with source location.
///
/// Raised while loading `atelier.toml`, resolving provider settings, or when a
/// builder rejects an incomplete generation configuration.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use atelier_error::ConfigError;
    ///
    /// let err = ConfigError::new("max_steps must be at least 1");
    /// assert!(err.message.contains("max_steps"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Builders generated by `derive_builder` report missing fields as strings.
impl From<String> for ConfigError {
    #[track_caller]
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
