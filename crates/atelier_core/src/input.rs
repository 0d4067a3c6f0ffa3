//! Message content parts.

use crate::MediaSource;
use serde::{Deserialize, Serialize};

/// One part of a message's content.
///
/// # Examples
///
/// ```
/// use atelier_core::{Input, MediaSource};
///
/// let text = Input::Text("Draw a lighthouse".to_string());
/// let image = Input::Image {
///     mime: Some("image/png".to_string()),
///     source: MediaSource::Binary(vec![0x89, 0x50]),
/// };
/// assert!(text.as_text().is_some());
/// assert!(image.as_text().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Input {
    /// Plain text.
    Text(String),

    /// Image (PNG, JPEG, WebP, GIF).
    Image {
        /// MIME type, e.g. "image/png"
        mime: Option<String>,
        /// Media source (URL, base64, or raw bytes)
        source: MediaSource,
    },
}

impl Input {
    /// Text content, if this part is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Input::Text(text) => Some(text),
            Input::Image { .. } => None,
        }
    }

    /// PNG image part from raw bytes.
    pub fn png(bytes: Vec<u8>) -> Self {
        Input::Image {
            mime: Some("image/png".to_string()),
            source: MediaSource::Binary(bytes),
        }
    }
}
