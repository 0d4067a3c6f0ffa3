//! Live view of a running generation.
//!
//! Each run owns the only writer of its channel; observers hold a
//! [`tokio::sync::watch::Receiver`] and always see a consistent snapshot.

use atelier_core::{Artifact, Cost, GenerationId, StepId, StepStatus, Usage};
use serde::Serialize;

/// Snapshot of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepState {
    /// Zero-based position within the run
    pub index: usize,
    /// Persisted id, once the record exists
    pub step_id: Option<StepId>,
    /// Prompt sent with this step
    pub rendered_prompt: String,
    /// Lifecycle status
    pub status: StepStatus,
    /// Model output so far
    pub raw_output: String,
    /// Current artifacts; pending while streaming, persisted at the end
    pub artifacts: Vec<Artifact>,
    /// Final token usage
    pub usage: Option<Usage>,
    /// Final cost
    pub cost: Option<Cost>,
    /// Failure reason
    pub error: Option<String>,
}

impl StepState {
    /// Fresh step awaiting its record.
    pub fn pending(index: usize, rendered_prompt: impl Into<String>) -> Self {
        Self {
            index,
            step_id: None,
            rendered_prompt: rendered_prompt.into(),
            status: StepStatus::Pending,
            raw_output: String::new(),
            artifacts: Vec::new(),
            usage: None,
            cost: None,
            error: None,
        }
    }
}

/// Snapshot of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunState {
    /// Generation id, once created
    pub generation_id: Option<GenerationId>,
    /// Steps in order
    pub steps: Vec<StepState>,
    /// Whether the run has ended
    pub finished: bool,
    /// Failure reason of a run that ended unsuccessfully
    pub error: Option<String>,
}

impl RunState {
    /// Newest step.
    pub fn current_step(&self) -> Option<&StepState> {
        self.steps.last()
    }

    /// Number of steps currently generating. Never more than one.
    pub fn generating(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Generating)
            .count()
    }

    /// Total cost of all finished steps.
    pub fn total_cost(&self) -> f64 {
        self.steps
            .iter()
            .filter_map(|step| step.cost.as_ref())
            .map(Cost::total)
            .sum()
    }

    pub(crate) fn current_step_mut(&mut self) -> Option<&mut StepState> {
        self.steps.last_mut()
    }
}
