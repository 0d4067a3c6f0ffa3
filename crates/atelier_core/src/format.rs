//! Target formats and output dimensions.

use serde::{Deserialize, Serialize};

/// Visual format the model is asked to produce.
///
/// # Examples
///
/// ```
/// use atelier_core::Format;
/// use std::str::FromStr;
///
/// assert_eq!(Format::from_str("ascii").unwrap(), Format::Ascii);
/// assert_eq!(Format::Svg.to_string(), "svg");
/// assert_eq!(Format::Ascii.body_extension(), "txt");
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
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Format {
    /// Scalable vector markup
    #[default]
    Svg,
    /// Fixed-width character grid
    Ascii,
}

impl Format {
    /// File extension of the artifact body.
    pub fn body_extension(&self) -> &'static str {
        match self {
            Format::Svg => "svg",
            Format::Ascii => "txt",
        }
    }
}

/// Output size: pixels for SVG, characters by lines for ASCII.
///
/// # Examples
///
/// ```
/// use atelier_core::Dimensions;
///
/// let dims = Dimensions::new(80, 24);
/// assert_eq!(dims.to_string(), "80x24");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_more::Display,
)]
#[display("{}x{}", width, height)]
pub struct Dimensions {
    /// Width in pixels or columns
    width: u32,
    /// Height in pixels or lines
    height: u32,
}

impl Dimensions {
    /// Create dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(512, 512)
    }
}
