//! Default prompt templates.
//!
//! Templates use `{{prompt}}`, `{{width}}` and `{{height}}` placeholders.
//! Dimensions are pixels for vector output and characters by lines for
//! character grids.

use atelier_core::{Dimensions, Format};

/// First-step template for vector output.
pub const SVG_INITIAL_TEMPLATE: &str = r#"You are an expert SVG artist.
First, think about the request:
1. Rephrase the prompt in your own words.
2. Visualize and describe the graphics in detail, including the composition of elements.
3. Finally, generate the SVG code.

Target dimensions: {{width}}x{{height}}

Start the SVG code with:
```
<svg width="{{width}}" height="{{height}}" viewBox="0 0 {{width}} {{height}}" xmlns="http://www.w3.org/2000/svg">

The user wants: {{prompt}}."#;

/// Refinement template for vector output.
pub const SVG_REFINEMENT_TEMPLATE: &str = r#"Carefully analyze the previous image and make SIGNIFICANT improvements.
First, think about the improvements:
1. Identify errors or mistakes in the previous version.
2. Describe how to improve visual quality, composition, and details.
3. Finally, generate the improved SVG code.

Target dimensions: {{width}}x{{height}}

Start the SVG code with:
```
<svg width="{{width}}" height="{{height}}" viewBox="0 0 {{width}} {{height}}" xmlns="http://www.w3.org/2000/svg">

Focus on:
1. **Fixing errors**
2. **Improving visual quality**
3. **Enhancing composition**
4. **Adding refinement**

The user wants: {{prompt}}."#;

/// First-step template for character grids.
pub const ASCII_INITIAL_TEMPLATE: &str = r#"You are an expert ASCII artist.
1. Rephrase the prompt in your own words.
2. Visualize how to represent this using ASCII characters.
3. Finally, generate the ASCII art inside a fenced code block.

Don't use unicode/emojis unless the user asks. Don't use ansi colors.

Target dimensions: {{width}} characters wide by {{height}} lines tall
User prompt: {{prompt}}."#;

/// Refinement template for character grids.
pub const ASCII_REFINEMENT_TEMPLATE: &str = r#"Carefully analyze the previous ASCII art and make improvements.
1. Identify errors or mistakes in the previous version.
2. Describe how to improve the visual representation using ASCII characters, line by line.
3. Finally, generate the improved ASCII art inside a fenced code block.

Reminder:
Target dimensions: {{width}} characters wide by {{height}} lines tall
User prompt: {{prompt}}."#;

/// Initial and refinement templates for one format.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct PromptTemplates {
    initial: String,
    refinement: String,
}

impl PromptTemplates {
    /// Custom template pair.
    pub fn new(initial: impl Into<String>, refinement: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            refinement: refinement.into(),
        }
    }

    /// Built-in templates for `format`.
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Svg => Self::new(SVG_INITIAL_TEMPLATE, SVG_REFINEMENT_TEMPLATE),
            Format::Ascii => Self::new(ASCII_INITIAL_TEMPLATE, ASCII_REFINEMENT_TEMPLATE),
        }
    }

    /// Rendered `(initial, refinement)` prompts.
    ///
    /// ```
    /// use atelier_core::{Dimensions, Format};
    /// use atelier_refine::PromptTemplates;
    ///
    /// let (initial, refinement) = PromptTemplates::new("Draw {{prompt}} at {{width}}x{{height}}", "Improve {{prompt}}")
    ///     .render("a fox", &Dimensions::new(64, 32));
    /// assert_eq!(initial, "Draw a fox at 64x32");
    /// assert_eq!(refinement, "Improve a fox");
    /// # let _ = Format::Svg;
    /// ```
    pub fn render(&self, prompt: &str, dimensions: &Dimensions) -> (String, String) {
        (
            render_template(&self.initial, prompt, dimensions),
            render_template(&self.refinement, prompt, dimensions),
        )
    }
}

/// Substitute the placeholders of one template.
pub fn render_template(template: &str, prompt: &str, dimensions: &Dimensions) -> String {
    template
        .replace("{{width}}", &dimensions.width().to_string())
        .replace("{{height}}", &dimensions.height().to_string())
        .replace("{{prompt}}", prompt)
}
