//! Artifact extraction from accumulating model output.
//!
//! The scanner works line by line. An opening fence is a line starting with
//! three backticks, an optional info tag, and a line break; the block runs
//! until the next line starting with three backticks or, while the stream is
//! still open, to the end of the text.

use atelier_core::Format;

const FENCE: &str = "```";

/// One candidate artifact body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    /// Body text. Vector bodies always end with a closing root tag.
    pub body: String,
    /// Whether the closing fence has been seen.
    pub complete: bool,
}

#[derive(Debug)]
struct FencedBlock<'a> {
    tag: &'a str,
    content: String,
    complete: bool,
}

/// Extract every artifact found so far in `raw`.
///
/// Pure and cheap enough to call on every streamed delta. Returns an empty
/// list when nothing matches.
///
/// # Examples
///
/// ```
/// use atelier_core::Format;
/// use atelier_render::extract_artifacts;
///
/// let raw = "Here you go:\n```svg\n<svg width=\"10\" height=\"10\"><rect";
/// let found = extract_artifacts(raw, Format::Svg);
/// assert_eq!(found.len(), 1);
/// assert!(found[0].body.starts_with("<svg"));
/// assert!(found[0].body.ends_with("</svg>"));
/// assert!(!found[0].complete);
/// ```
pub fn extract_artifacts(raw: &str, format: Format) -> Vec<ExtractedArtifact> {
    match format {
        Format::Svg => extract_vectors(raw),
        Format::Ascii => extract_grids(raw),
    }
}

fn extract_vectors(raw: &str) -> Vec<ExtractedArtifact> {
    scan_blocks(raw, true)
        .into_iter()
        .filter(|block| {
            let tag = block.tag.to_ascii_lowercase();
            tag.is_empty() || tag == "svg" || tag == "xml"
        })
        .filter_map(|block| {
            let body = block.content.trim_start();
            if !body.starts_with("<svg") {
                return None;
            }
            let mut body = body.trim_end().to_string();
            if !body.contains("</svg>") {
                body.push_str("</svg>");
            }
            Some(ExtractedArtifact {
                body,
                complete: block.complete,
            })
        })
        .collect()
}

fn extract_grids(raw: &str) -> Vec<ExtractedArtifact> {
    scan_blocks(raw, false)
        .into_iter()
        .filter(|block| {
            let trimmed = block.content.trim();
            !trimmed.is_empty() && !trimmed.starts_with("<svg") && !trimmed.starts_with("<?xml")
        })
        .map(|block| ExtractedArtifact {
            body: block.content,
            complete: block.complete,
        })
        .collect()
}

/// Split `raw` into fenced blocks.
///
/// With `inline_close`, a fence appearing anywhere inside a line also ends
/// the block; markup is often closed on the same line as its last tag.
fn scan_blocks(raw: &str, inline_close: bool) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut lines = raw.split_inclusive('\n');

    while let Some(line) = lines.next() {
        let Some(tag) = opening_tag(line) else {
            continue;
        };

        let mut content = String::new();
        let mut complete = false;
        for inner in lines.by_ref() {
            if inner.trim_start().starts_with(FENCE) {
                complete = true;
                break;
            }
            if inline_close && let Some(pos) = inner.find(FENCE) {
                content.push_str(&inner[..pos]);
                complete = true;
                break;
            }
            content.push_str(inner);
        }

        if complete {
            strip_line_break(&mut content);
        }
        blocks.push(FencedBlock {
            tag,
            content,
            complete,
        });
    }

    blocks
}

/// Info tag of an opening fence line, or `None` if the line is not one.
fn opening_tag(line: &str) -> Option<&str> {
    let text = line.strip_suffix('\n')?;
    let text = text.strip_suffix('\r').unwrap_or(text);
    let info = text.trim_start().strip_prefix(FENCE)?;
    if info.contains('`') {
        return None;
    }
    Some(info.split_whitespace().next().unwrap_or(""))
}

fn strip_line_break(content: &mut String) {
    if content.ends_with('\n') {
        content.pop();
        if content.ends_with('\r') {
            content.pop();
        }
    }
}
