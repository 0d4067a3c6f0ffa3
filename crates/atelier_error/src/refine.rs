//! Refinement loop error types.

/// Refinement loop error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RefineErrorKind {
    /// The caller cancelled the run
    #[display("Generation cancelled")]
    Cancelled,
}

/// Refinement error with location tracking.
///
/// # Examples
///
/// ```
/// use atelier_error::{RefineError, RefineErrorKind};
///
/// let err = RefineError::new(RefineErrorKind::Cancelled);
/// assert!(format!("{}", err).contains("cancelled"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Refine Error: {} at line {} in {}", kind, line, file)]
pub struct RefineError {
    /// The specific error kind
    pub kind: RefineErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl RefineError {
    /// Create a new refinement error.
    #[track_caller]
    pub fn new(kind: RefineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
