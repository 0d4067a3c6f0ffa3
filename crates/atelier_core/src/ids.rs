//! Identifiers issued by the persistence gateway.

use serde::{Deserialize, Serialize};

/// Identity of a generation run.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// Borrow the id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GenerationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Globally monotonic step ordinal.
///
/// # Examples
///
/// ```
/// use atelier_core::StepId;
///
/// assert!(StepId::new(7) > StepId::new(3));
/// assert_eq!(StepId::new(7).to_string(), "7");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct StepId(i64);

impl StepId {
    /// Wrap a raw ordinal.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw ordinal.
    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Identity of a persisted artifact record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct ArtifactId(i64);

impl ArtifactId {
    /// Wrap a raw id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Identity of a persisted reference image record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct ImageId(i64);

impl ImageId {
    /// Wrap a raw id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn get(&self) -> i64 {
        self.0
    }
}
