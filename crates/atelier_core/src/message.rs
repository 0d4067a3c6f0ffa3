//! Message types for conversation history.

use crate::{Input, Role};
use serde::{Deserialize, Serialize};

/// A multimodal message in a conversation.
///
/// # Examples
///
/// ```
/// use atelier_core::{Input, Message, Role};
///
/// let message = Message::user(vec![Input::Text("Hello!".to_string())]);
/// assert_eq!(message.role, Role::User);
/// assert_eq!(message.text(), "Hello!");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The content of the message (can be multimodal)
    pub content: Vec<Input>,
}

impl Message {
    /// User turn with the given parts.
    pub fn user(content: Vec<Input>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Assistant turn holding plain text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![Input::Text(text.into())],
        }
    }

    /// Concatenation of all text parts, separated by blank lines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Input::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Number of image parts.
    pub fn image_count(&self) -> usize {
        self.content
            .iter()
            .filter(|part| matches!(part, Input::Image { .. }))
            .count()
    }
}
