//! Rasterization of artifact bodies.

use crate::context::{byte_offset, error_context};
use crate::grid::{AsciiStyle, synthesize_grid_svg_within};
use atelier_core::{ContentError, Dimensions, Format};
use atelier_error::{AtelierResult, RenderError, RenderErrorKind};
use resvg::tiny_skia;
use resvg::usvg;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Largest canvas side accepted for rasterization.
pub const DEFAULT_MAX_SIDE: u32 = 8192;

/// Result of rendering one artifact body.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// Body rendered.
    Rendered {
        /// PNG bytes at the artifact's logical size
        png: Vec<u8>,
        /// Canonical vector markup the raster was drawn from
        normalized: String,
    },
    /// Body could not be rendered; fed back to the model.
    Failed(ContentError),
}

impl RenderOutcome {
    /// Whether rendering succeeded.
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered { .. })
    }

    /// The content error, if rendering failed.
    pub fn error(&self) -> Option<&ContentError> {
        match self {
            RenderOutcome::Failed(error) => Some(error),
            RenderOutcome::Rendered { .. } => None,
        }
    }
}

/// Turns artifact bodies into PNG previews or content errors.
///
/// Problems with the body are reported as [`RenderOutcome::Failed`]; only
/// failures of the rasterizer itself are returned as errors. Rendering is
/// CPU-bound and blocking; async callers should run it on a blocking thread.
///
/// # Examples
///
/// ```
/// use atelier_core::{Dimensions, Format};
/// use atelier_render::{RenderOutcome, Renderer};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = Renderer::without_system_fonts();
/// let body = r#"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect width="8" height="8" fill="red"/></svg>"#;
/// let outcome = renderer.render(body, Format::Svg, &Dimensions::new(8, 8))?;
/// assert!(outcome.is_rendered());
///
/// let outcome = renderer.render("<svg><g></svg>", Format::Svg, &Dimensions::new(8, 8))?;
/// assert_eq!(outcome.error().and_then(|e| e.line), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Renderer {
    fontdb: Arc<usvg::fontdb::Database>,
    ascii_style: AsciiStyle,
    context_radius: usize,
    max_side: u32,
}

impl Renderer {
    /// Renderer using the fonts installed on this system.
    #[tracing::instrument]
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!(faces = fontdb.len(), "Loaded system fonts");
        Self::with_fontdb(Arc::new(fontdb))
    }

    /// Renderer without any fonts. Text is skipped; useful for tests.
    pub fn without_system_fonts() -> Self {
        Self::with_fontdb(Arc::new(usvg::fontdb::Database::new()))
    }

    /// Renderer sharing an existing font database.
    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self {
            fontdb,
            ascii_style: AsciiStyle::default(),
            context_radius: 2,
            max_side: DEFAULT_MAX_SIDE,
        }
    }

    /// Style for character-grid previews.
    pub fn with_ascii_style(mut self, style: AsciiStyle) -> Self {
        self.ascii_style = style;
        self
    }

    /// Number of lines shown on each side of a failing line.
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Largest canvas side accepted.
    pub fn with_max_side(mut self, max_side: u32) -> Self {
        self.max_side = max_side;
        self
    }

    /// Style used for character grids.
    pub fn ascii_style(&self) -> AsciiStyle {
        self.ascii_style
    }

    /// Render one artifact body.
    ///
    /// Character grids are first laid out as vector markup sized from
    /// `dimensions` and scaled down to the canvas limit; vector bodies are
    /// rendered at their own logical size.
    ///
    /// # Errors
    ///
    /// Returns an error only when the raster cannot be allocated or encoded.
    pub fn render(
        &self,
        body: &str,
        format: Format,
        dimensions: &Dimensions,
    ) -> AtelierResult<RenderOutcome> {
        match format {
            Format::Svg => self.render_vector(body),
            Format::Ascii => self.render_vector(&self.grid_markup(body, dimensions)),
        }
    }

    /// Vector markup for a character grid in this renderer's style, scaled
    /// to fit the canvas limit so it always rasterizes.
    pub fn grid_markup(&self, body: &str, dimensions: &Dimensions) -> String {
        synthesize_grid_svg_within(body, dimensions, self.ascii_style, self.max_side)
    }

    fn render_vector(&self, body: &str) -> AtelierResult<RenderOutcome> {
        let patched = match self.check_structure(body) {
            Ok(patched) => patched,
            Err(error) => {
                tracing::debug!(error = %error, "Artifact failed structural parse");
                return Ok(RenderOutcome::Failed(error));
            }
        };
        let body = patched.as_deref().unwrap_or(body);

        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);
        let tree = match panic::catch_unwind(AssertUnwindSafe(|| {
            usvg::Tree::from_str(body, &options)
        })) {
            Ok(Ok(tree)) => tree,
            Ok(Err(e)) => return Ok(RenderOutcome::Failed(ContentError::new(e.to_string()))),
            Err(payload) => {
                return Ok(RenderOutcome::Failed(ContentError::new(format!(
                    "SVG conversion failed: {}",
                    panic_message(payload.as_ref())
                ))));
            }
        };
        let normalized = tree.to_string(&usvg::WriteOptions::default());

        let size = tree.size();
        let width = size.width().ceil() as u32;
        let height = size.height().ceil() as u32;
        if width == 0 || height == 0 {
            return Ok(RenderOutcome::Failed(ContentError::new(format!(
                "SVG has an empty canvas ({}x{})",
                width, height
            ))));
        }
        if width > self.max_side || height > self.max_side {
            return Ok(RenderOutcome::Failed(ContentError::new(format!(
                "SVG canvas {}x{} exceeds the {} pixel limit",
                width, height, self.max_side
            ))));
        }

        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| RenderError::new(RenderErrorKind::PixmapAllocation { width, height }))?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let drawn = panic::catch_unwind(AssertUnwindSafe(|| {
            resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut())
        }));
        if let Err(payload) = drawn {
            return Ok(RenderOutcome::Failed(ContentError::new(format!(
                "Rasterization failed: {}",
                panic_message(payload.as_ref())
            ))));
        }

        let png = pixmap
            .encode_png()
            .map_err(|e| RenderError::new(RenderErrorKind::PngEncoding(e.to_string())))?;
        tracing::debug!(width, height, png_bytes = png.len(), "Rendered artifact");
        Ok(RenderOutcome::Rendered { png, normalized })
    }

    /// Parse `body` as XML and require an `svg` root, locating any failure.
    ///
    /// Returns a copy of the body with the SVG namespace declared when the
    /// root element omits it.
    fn check_structure(&self, body: &str) -> Result<Option<String>, ContentError> {
        match roxmltree::Document::parse(body) {
            Ok(document) => {
                let root = document.root_element();
                let name = root.tag_name().name();
                let namespace = root.tag_name().namespace();
                if name == "svg" && namespace == Some(SVG_NS) {
                    Ok(None)
                } else if name == "svg" && namespace.is_none() {
                    let start = root.range().start;
                    let mut patched = String::with_capacity(body.len() + SVG_NS.len() + 9);
                    patched.push_str(&body[..start + 4]);
                    patched.push_str(&format!(" xmlns=\"{}\"", SVG_NS));
                    patched.push_str(&body[start + 4..]);
                    Ok(Some(patched))
                } else {
                    let pos = document.text_pos_at(root.range().start);
                    let message = if name == "svg" {
                        "Root <svg> element is not in the SVG namespace".to_string()
                    } else {
                        format!("Root element is <{}>, expected <svg>", name)
                    };
                    Err(self.located(body, message, pos.row, pos.col))
                }
            }
            Err(e) => {
                let pos = e.pos();
                Err(self.located(body, e.to_string(), pos.row, pos.col))
            }
        }
    }

    fn located(&self, body: &str, message: String, line: u32, column: u32) -> ContentError {
        let mut error = ContentError::new(message)
            .at(line, column)
            .with_salvaged(&body[..byte_offset(body, line, column)]);
        if let Some(context) = error_context(body, line, column, self.context_radius) {
            error = error.with_context(context);
        }
        error
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
