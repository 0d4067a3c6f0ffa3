//! What the model is told about its previous attempt.

use atelier_core::{ContentError, Format, Input};

/// Text placed before the preview image.
pub const PREVIEW_LEAD_IN: &str = "Here is how your previous code rendered:";

const SVG_COMMON_ISSUES: &str = "This usually means there's a syntax error in the SVG. Common issues:
- Duplicate or conflicting attributes (e.g., two 'd' attributes on a path)
- Invalid attribute combinations (e.g., 'y1' on a <path> instead of <line>)
- Unclosed tags or malformed paths
- Invalid XML syntax
- Missing closing tags";

/// Result of a previous step as shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// PNG preview of the last artifact that rendered
    Preview(Vec<u8>),
    /// Why nothing rendered
    Error(ContentError),
}

impl Feedback {
    /// Feedback for a step whose output held no artifact.
    pub fn no_artifact() -> Self {
        Feedback::Error(ContentError::no_artifact())
    }

    /// Message parts for the feedback turn, before the refinement prompt.
    pub fn to_inputs(&self, format: Format) -> Vec<Input> {
        match self {
            Feedback::Preview(png) => vec![
                Input::Text(PREVIEW_LEAD_IN.to_string()),
                Input::png(png.clone()),
            ],
            Feedback::Error(error) => vec![Input::Text(failure_text(error, format))],
        }
    }

    /// Whether this feedback carries a preview.
    pub fn is_preview(&self) -> bool {
        matches!(self, Feedback::Preview(_))
    }
}

/// Describe a content error for the model.
///
/// # Examples
///
/// ```
/// use atelier_core::{ContentError, Format};
/// use atelier_refine::failure_text;
///
/// let error = ContentError::new("unexpected end of stream")
///     .at(3, 1)
///     .with_context(">>> 3: <g>\n        ^--- Error here");
/// let text = failure_text(&error, Format::Svg);
/// assert!(text.starts_with("⚠️ WARNING: The previous SVG failed to render to PNG with error: \"unexpected end of stream\""));
/// assert!(text.contains("Error location (Line 3, Column 1):"));
/// assert!(text.ends_with("The SVG code is in your previous message."));
/// ```
pub fn failure_text(error: &ContentError, format: Format) -> String {
    if error.is_no_artifact() {
        return error.message.clone();
    }

    let subject = match format {
        Format::Svg => "SVG",
        Format::Ascii => "ASCII art",
    };
    let mut text = format!(
        "⚠️ WARNING: The previous {} failed to render to PNG with error: \"{}\"",
        subject, error.message
    );
    if let Some(context) = &error.context {
        let (line, column) = error.location().unwrap_or_default();
        text.push_str(&format!(
            "\n\nError location (Line {}, Column {}):\n```\n{}\n```",
            line, column, context
        ));
    }
    if format == Format::Svg {
        text.push_str("\n\n");
        text.push_str(SVG_COMMON_ISSUES);
    }
    text.push_str(&format!(
        "\n\nPlease review and fix the {} code. The {} code is in your previous message.",
        subject, subject
    ));
    text
}
