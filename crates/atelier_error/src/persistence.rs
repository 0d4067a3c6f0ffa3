//! Persistence gateway error types.

/// Persistence error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PersistenceErrorKind {
    /// A durable record could not be written
    #[display("Failed to write record: {}", _0)]
    RecordWrite(String),
    /// A blob upload failed
    #[display("Failed to upload blob: {}", _0)]
    BlobUpload(String),
    /// The compensating delete after a failed upload also failed
    #[display("Compensating delete failed: {}", _0)]
    Compensation(String),
    /// Referenced record does not exist
    #[display("Record not found: {}", _0)]
    NotFound(String),
    /// Gateway handed out a step id that does not increase
    #[display("Step id {} does not follow {}", next, previous)]
    NonMonotonicStep {
        /// Previously issued id
        previous: i64,
        /// Newly issued id
        next: i64,
    },
    /// Record snapshot could not be written
    #[display("Failed to write snapshot: {}", _0)]
    Snapshot(String),
}

/// Persistence error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Persistence Error: {} at line {} in {}", kind, line, file)]
pub struct PersistenceError {
    /// The specific error kind
    pub kind: PersistenceErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl PersistenceError {
    /// Create a new persistence error.
    #[track_caller]
    pub fn new(kind: PersistenceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
