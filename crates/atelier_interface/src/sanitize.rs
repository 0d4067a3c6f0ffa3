//! Markup sanitization seam.

/// Cleans untrusted markup between extraction and rendering.
pub trait Sanitizer: Send + Sync {
    /// Return a copy of `body` with disallowed content removed.
    fn sanitize(&self, body: &str) -> String;
}

/// Sanitizer that returns its input unchanged. Used for character grids,
/// which are escaped when synthesized into markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Sanitizer for PassThrough {
    fn sanitize(&self, body: &str) -> String {
        body.to_string()
    }
}
