//! Media source types for image content.

use serde::{Deserialize, Serialize};

/// Where image content is sourced from.
///
/// # Examples
///
/// ```
/// use atelier_core::MediaSource;
///
/// let url = MediaSource::Url("https://example.com/reference.png".to_string());
/// let binary = MediaSource::Binary(vec![0x89, 0x50, 0x4E, 0x47]);
/// assert_ne!(url, binary);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaSource {
    /// Dereferenceable URL
    Url(String),
    /// Base64-encoded content
    Base64(String),
    /// Raw binary data
    Binary(Vec<u8>),
}
