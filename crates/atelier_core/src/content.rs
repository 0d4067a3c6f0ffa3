//! Content errors: artifacts that could not be rendered.

use serde::{Deserialize, Serialize};

/// Message fed back to the model when a step produced no artifact.
pub const NO_ARTIFACT_MESSAGE: &str =
    "No artifact was found in your response. Reply with the complete artwork inside a fenced code block.";

/// Why an artifact body could not be rendered.
///
/// This is data, not a fault: the refinement loop sends it back to the model
/// so it can correct itself.
///
/// # Examples
///
/// ```
/// use atelier_core::ContentError;
///
/// let err = ContentError::new("unexpected end of stream").at(3, 7);
/// assert_eq!(err.location(), Some((3, 7)));
/// assert!(!ContentError::no_artifact().is_located());
/// assert!(ContentError::no_artifact().is_no_artifact());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{}", message)]
pub struct ContentError {
    /// Parser or rasterizer message
    pub message: String,
    /// One-based line of the failure
    pub line: Option<u32>,
    /// One-based column of the failure
    pub column: Option<u32>,
    /// Lines around the failure with a marker
    pub context: Option<String>,
    /// Body text preceding the failure
    pub salvaged: Option<String>,
}

impl ContentError {
    /// Error with a message and nothing else.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            context: None,
            salvaged: None,
        }
    }

    /// Synthetic error for a step without any extractable artifact.
    pub fn no_artifact() -> Self {
        Self::new(NO_ARTIFACT_MESSAGE)
    }

    /// Attach a position.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attach a context snippet.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach salvaged content.
    pub fn with_salvaged(mut self, salvaged: impl Into<String>) -> Self {
        self.salvaged = Some(salvaged.into());
        self
    }

    /// Line and column, when both are known.
    pub fn location(&self) -> Option<(u32, u32)> {
        self.line.zip(self.column)
    }

    /// Whether the failure has a known position.
    pub fn is_located(&self) -> bool {
        self.line.is_some()
    }

    /// Whether this is the synthetic missing-artifact error.
    pub fn is_no_artifact(&self) -> bool {
        self.message == NO_ARTIFACT_MESSAGE && !self.is_located()
    }
}
