//! Step history and per-step message assembly.

use crate::feedback::Feedback;
use atelier_core::{GenerationConfig, HistoryPolicy, Input, MediaSource, Message};

/// A finished step as replayed to later steps.
#[derive(Debug, Clone, PartialEq)]
pub struct StepHistoryEntry {
    /// Full model output of the step
    pub raw_output: String,
    /// What the model is told about that output
    pub feedback: Feedback,
}

impl StepHistoryEntry {
    /// Entry from output and feedback.
    pub fn new(raw_output: impl Into<String>, feedback: Feedback) -> Self {
        Self {
            raw_output: raw_output.into(),
            feedback,
        }
    }
}

/// Conversation for the next step.
///
/// The first user turn always holds the reference images and the initial
/// prompt. Each replayed entry adds the model's output as an assistant turn
/// and a user turn with the feedback followed by the refinement prompt.
/// [`HistoryPolicy::LastOnly`] replays only the newest entry.
///
/// # Examples
///
/// ```
/// use atelier_core::{GenerationConfig, HistoryPolicy, ProviderSettings, Role};
/// use atelier_refine::{Feedback, StepHistoryEntry, build_messages};
///
/// let config = GenerationConfig::builder()
///     .prompt("a boat")
///     .provider(ProviderSettings::new("openai", "gpt-4o"))
///     .max_steps(3u32)
///     .history(HistoryPolicy::LastOnly)
///     .initial_prompt("Draw a boat.")
///     .refinement_prompt("Improve it.")
///     .build()
///     .unwrap();
/// let history = vec![
///     StepHistoryEntry::new("first", Feedback::Preview(vec![1])),
///     StepHistoryEntry::new("second", Feedback::no_artifact()),
/// ];
///
/// let messages = build_messages(&config, &history);
/// assert_eq!(messages.len(), 3);
/// assert_eq!(messages[1].role, Role::Assistant);
/// assert_eq!(messages[1].text(), "second");
/// ```
pub fn build_messages(config: &GenerationConfig, history: &[StepHistoryEntry]) -> Vec<Message> {
    let mut first: Vec<Input> = config
        .reference_images()
        .iter()
        .map(|image| Input::Image {
            mime: Some(image.mime.clone()),
            source: MediaSource::Binary(image.bytes.clone()),
        })
        .collect();
    first.push(Input::Text(config.initial_prompt().clone()));

    let replayed = match config.history() {
        HistoryPolicy::Full => history,
        HistoryPolicy::LastOnly => &history[history.len().saturating_sub(1)..],
    };

    let mut messages = Vec::with_capacity(1 + 2 * replayed.len());
    messages.push(Message::user(first));
    for entry in replayed {
        messages.push(Message::assistant(entry.raw_output.clone()));
        let mut turn = entry.feedback.to_inputs(*config.format());
        turn.push(Input::Text(config.refinement_prompt().clone()));
        messages.push(Message::user(turn));
    }
    messages
}
