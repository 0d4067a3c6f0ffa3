//! Character-grid artifacts laid out as vector markup.

use crate::renderer::DEFAULT_MAX_SIDE;
use atelier_core::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const FONT_SIZE: f32 = 14.0;
/// Width of one cell relative to the font size.
const CELL_ASPECT: f32 = 0.6;
const LINE_HEIGHT: f32 = 1.2;
const PADDING: f32 = 16.0;
const TAB_WIDTH: usize = 4;

/// Display style of character-grid previews.
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
pub enum AsciiStyle {
    /// Green text on a dark terminal
    #[default]
    Crt,
    /// Dark bold text on paper
    Teletype,
}

struct Palette {
    background: &'static str,
    foreground: &'static str,
    frame: &'static str,
    font_family: &'static str,
    font_weight: Option<&'static str>,
}

impl AsciiStyle {
    fn palette(&self) -> Palette {
        match self {
            AsciiStyle::Crt => Palette {
                background: "#18181b",
                foreground: "#22c55e",
                frame: "#3f3f46",
                font_family: "DejaVu Sans Mono, Menlo, Consolas, monospace",
                font_weight: None,
            },
            AsciiStyle::Teletype => Palette {
                background: "#f5f0e6",
                foreground: "#27272a",
                frame: "#d4d4d8",
                font_family: "Fira Code, Courier New, monospace",
                font_weight: Some("700"),
            },
        }
    }
}

/// Rows and columns a grid body occupies, never smaller than `target`.
///
/// # Examples
///
/// ```
/// use atelier_core::Dimensions;
/// use atelier_render::grid_size;
///
/// assert_eq!(grid_size("ab\nabcd", &Dimensions::new(2, 1)), (4, 2));
/// assert_eq!(grid_size("x", &Dimensions::new(80, 24)), (80, 24));
/// ```
pub fn grid_size(body: &str, target: &Dimensions) -> (usize, usize) {
    let lines = grid_lines(body);
    let cols = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        .max(*target.width() as usize)
        .max(1);
    let rows = lines.len().max(*target.height() as usize).max(1);
    (cols, rows)
}

/// Synthesize vector markup showing `body` in a framed monospace grid.
///
/// The canvas is `cols * cell width` by `rows * line height` plus padding,
/// so its aspect ratio follows the grid shape. Canvases larger than
/// [`DEFAULT_MAX_SIDE`] are scaled down; see [`synthesize_grid_svg_within`].
pub fn synthesize_grid_svg(body: &str, target: &Dimensions, style: AsciiStyle) -> String {
    synthesize_grid_svg_within(body, target, style, DEFAULT_MAX_SIDE)
}

/// Like [`synthesize_grid_svg`], with the longer canvas side scaled down to
/// at most `max_side` pixels. The layout keeps its aspect ratio.
///
/// # Examples
///
/// ```
/// use atelier_core::Dimensions;
/// use atelier_render::{AsciiStyle, synthesize_grid_svg_within};
///
/// let svg = synthesize_grid_svg_within("#", &Dimensions::new(512, 512), AsciiStyle::Crt, 1024);
/// assert!(svg.contains(r#"height="1024""#));
/// ```
pub fn synthesize_grid_svg_within(
    body: &str,
    target: &Dimensions,
    style: AsciiStyle,
    max_side: u32,
) -> String {
    let palette = style.palette();
    let (cols, rows) = grid_size(body, target);
    let cell_width = FONT_SIZE * CELL_ASPECT;
    let line_height = FONT_SIZE * LINE_HEIGHT;
    let width = (cols as f32 * cell_width + 2.0 * PADDING).round();
    let height = (rows as f32 * line_height + 2.0 * PADDING).round();
    let (out_width, out_height) = fit_canvas(width, height, max_side);

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        out_width, out_height, width, height
    );
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
        width, height, palette.background
    );
    let _ = write!(
        svg,
        r#"<rect x="4" y="4" width="{}" height="{}" rx="6" fill="none" stroke="{}" stroke-width="2"/>"#,
        width - 8.0,
        height - 8.0,
        palette.frame
    );
    let _ = write!(
        svg,
        r#"<text font-family="{}" font-size="{}" fill="{}" xml:space="preserve""#,
        palette.font_family, FONT_SIZE, palette.foreground
    );
    if let Some(weight) = palette.font_weight {
        let _ = write!(svg, r#" font-weight="{}""#, weight);
    }
    svg.push('>');

    for (row, line) in grid_lines(body).iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let baseline = PADDING + row as f32 * line_height + FONT_SIZE;
        let _ = write!(
            svg,
            r#"<tspan x="{}" y="{:.1}">{}</tspan>"#,
            PADDING,
            baseline,
            escape_text(line)
        );
    }
    svg.push_str("</text></svg>");
    svg
}

/// Output size of a `width` by `height` layout no longer than `max_side`.
fn fit_canvas(width: f32, height: f32, max_side: u32) -> (f32, f32) {
    let limit = max_side.max(1) as f32;
    if width.max(height) <= limit {
        return (width, height);
    }
    if width >= height {
        (limit, (height * limit / width).floor().max(1.0))
    } else {
        ((width * limit / height).floor().max(1.0), limit)
    }
}

fn grid_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| line.replace('\t', &" ".repeat(TAB_WIDTH)))
        .collect()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}
