//! Artifact extraction, sanitization and rendering for Atelier.
//!
//! - [`extract_artifacts`] finds candidate bodies in partial model output.
//! - [`AllowListSanitizer`] strips untrusted markup down to a fixed set of
//!   SVG elements and attributes.
//! - [`Renderer`] turns a body into a PNG preview plus canonical markup, or
//!   into a located [`ContentError`](atelier_core::ContentError).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod extract;
mod grid;
mod renderer;
mod sanitize;

pub use context::error_context;
pub use extract::{ExtractedArtifact, extract_artifacts};
pub use grid::{AsciiStyle, grid_size, synthesize_grid_svg, synthesize_grid_svg_within};
pub use renderer::{DEFAULT_MAX_SIDE, RenderOutcome, Renderer};
pub use sanitize::AllowListSanitizer;
