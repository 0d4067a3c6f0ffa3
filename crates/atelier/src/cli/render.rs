//! Offline render command handler.

use super::commands::RenderArgs;
use atelier::{
    AllowListSanitizer, AtelierConfig, Dimensions, Format, RenderOutcome, Sanitizer,
    extract_artifacts,
};
use tracing::debug;

/// Render one artifact body from a file to PNG.
///
/// A file holding a model reply is accepted too; the last fenced artifact is
/// rendered.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the body does not render, or
/// the PNG cannot be written.
pub async fn render_file(
    args: RenderArgs,
    config: &AtelierConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", args.file.display(), e))?;
    let format: Format = args
        .format
        .map(Into::into)
        .or_else(|| guess_format(&args.file))
        .unwrap_or(config.defaults.format);
    let fallback = config.defaults.dimensions(format);
    let dimensions = Dimensions::new(
        args.width.unwrap_or(*fallback.width()),
        args.height.unwrap_or(*fallback.height()),
    );

    let body = match extract_artifacts(&text, format).pop() {
        Some(artifact) => {
            debug!(complete = artifact.complete, "Rendering extracted artifact");
            artifact.body
        }
        None => text,
    };
    let body = match format {
        Format::Svg => AllowListSanitizer::new().sanitize(&body),
        Format::Ascii => body,
    };

    let mut renderer = config.renderer();
    if let Some(style) = args.style {
        renderer = renderer.with_ascii_style(style.into());
    }
    let outcome = tokio::task::spawn_blocking(move || renderer.render(&body, format, &dimensions))
        .await??;

    match outcome {
        RenderOutcome::Rendered { png, .. } => {
            let out = args.out.unwrap_or_else(|| args.file.with_extension("png"));
            tokio::fs::write(&out, &png)
                .await
                .map_err(|e| format!("Failed to write {}: {}", out.display(), e))?;
            println!("{}", out.display());
            Ok(())
        }
        RenderOutcome::Failed(error) => {
            let mut message = error.message.clone();
            if let Some((line, column)) = error.location() {
                message.push_str(&format!(" (line {}, column {})", line, column));
            }
            if let Some(context) = &error.context {
                message.push('\n');
                message.push_str(context);
            }
            Err(message.into())
        }
    }
}

fn guess_format(path: &std::path::Path) -> Option<Format> {
    match path.extension()?.to_str()? {
        "svg" => Some(Format::Svg),
        "txt" => Some(Format::Ascii),
        _ => None,
    }
}
