//! Request types for streaming generation.

use crate::Message;
use serde::{Deserialize, Serialize};

/// Provider-agnostic generation request.
///
/// # Examples
///
/// ```
/// use atelier_core::{GenerateRequest, Input, Message};
///
/// let request = GenerateRequest {
///     messages: vec![Message::user(vec![Input::Text("Hello!".to_string())])],
///     max_tokens: Some(4096),
///     temperature: None,
///     model: Some("gpt-4o".to_string()),
/// };
/// assert_eq!(request.messages.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    /// The conversation messages to send
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Model identifier overriding the adapter's default
    pub model: Option<String>,
}
