//! Renderer infrastructure errors.
//!
//! Problems with an artifact body are not errors at this level; they are
//! reported as data by the renderer. These kinds cover faults of the
//! rasterizer backend itself.

/// Fatal renderer conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RenderErrorKind {
    /// Pixmap allocation failed for a valid canvas size
    #[display("Failed to allocate {}x{} pixmap", width, height)]
    PixmapAllocation {
        /// Canvas width in pixels
        width: u32,
        /// Canvas height in pixels
        height: u32,
    },
    /// Raster could not be encoded as PNG
    #[display("PNG encoding failed: {}", _0)]
    PngEncoding(String),
    /// Blocking render task did not complete
    #[display("Render worker failed: {}", _0)]
    Worker(String),
}

/// Renderer error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Render Error: {} at line {} in {}", kind, line, file)]
pub struct RenderError {
    /// The specific error kind
    pub kind: RenderErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl RenderError {
    /// Create a new render error.
    #[track_caller]
    pub fn new(kind: RenderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
