//! Step lifecycle types.

use crate::{Cost, Usage};
use serde::{Deserialize, Serialize};

/// Lifecycle of one provider round-trip.
///
/// `Pending -> Generating -> Completed | Failed`. A completed step can still
/// fail if persisting its artifacts fails afterwards.
///
/// # Examples
///
/// ```
/// use atelier_core::StepStatus;
///
/// assert!(StepStatus::Pending.can_become(StepStatus::Generating));
/// assert!(StepStatus::Generating.can_become(StepStatus::Failed));
/// assert!(!StepStatus::Completed.can_become(StepStatus::Generating));
/// ```
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepStatus {
    /// Record created, stream not yet open
    #[default]
    Pending,
    /// Stream open
    Generating,
    /// Stream finished and artifacts persisted
    Completed,
    /// Stream, persistence or cancellation failure
    Failed,
}

impl StepStatus {
    /// Whether the status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_become(&self, next: StepStatus) -> bool {
        match (self, next) {
            (StepStatus::Pending, StepStatus::Generating) => true,
            (
                StepStatus::Pending | StepStatus::Generating | StepStatus::Completed,
                StepStatus::Failed,
            ) => true,
            (StepStatus::Generating, StepStatus::Generating | StepStatus::Completed) => true,
            _ => false,
        }
    }
}

/// Fields written by `update_step`.
///
/// # Examples
///
/// ```
/// use atelier_core::{StepStatus, StepUpdate};
///
/// let update = StepUpdate::failed("partial text", "Generation cancelled");
/// assert_eq!(update.status, StepStatus::Failed);
/// assert_eq!(update.error_message.as_deref(), Some("Generation cancelled"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct StepUpdate {
    /// Accumulated raw output
    pub raw_output: String,
    /// New status
    pub status: StepStatus,
    /// Final token usage
    pub usage: Option<Usage>,
    /// Derived cost
    pub cost: Option<Cost>,
    /// Failure reason
    pub error_message: Option<String>,
}

impl StepUpdate {
    /// Update carrying only a status change.
    pub fn status(status: StepStatus) -> Self {
        Self {
            raw_output: String::new(),
            status,
            usage: None,
            cost: None,
            error_message: None,
        }
    }

    /// Successful completion.
    pub fn completed(raw_output: impl Into<String>, usage: Usage, cost: Cost) -> Self {
        Self::status(StepStatus::Completed)
            .with_raw_output(raw_output.into())
            .with_usage(usage)
            .with_cost(cost)
    }

    /// Failure with the most detailed message available.
    pub fn failed(raw_output: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self::status(StepStatus::Failed)
            .with_raw_output(raw_output.into())
            .with_error_message(error_message.into())
    }
}
