//! Source snippets around a failure position.

/// Lines `line - radius ..= line + radius` of `body`, numbered, with the
/// failing line marked and a caret under `column`.
///
/// `line` and `column` are one-based. Returns `None` when `line` is outside
/// the body.
///
/// # Examples
///
/// ```
/// use atelier_render::error_context;
///
/// let body = "<svg>\n<g>\n<rect/>\n</svg>";
/// let snippet = error_context(body, 4, 3, 1).unwrap();
/// assert_eq!(snippet, "    3: <rect/>\n>>> 4: </svg>\n         ^--- Error here");
/// ```
pub fn error_context(body: &str, line: u32, column: u32, radius: usize) -> Option<String> {
    let lines: Vec<&str> = body.lines().collect();
    let target = usize::try_from(line).ok()?.checked_sub(1)?;
    if target >= lines.len() {
        return None;
    }

    let first = target.saturating_sub(radius);
    let last = (target + radius).min(lines.len() - 1);
    let mut out = Vec::with_capacity(last - first + 2);
    for (index, text) in lines.iter().enumerate().take(last + 1).skip(first) {
        let number = index + 1;
        if index == target {
            let prefix = format!(">>> {}: ", number);
            out.push(format!("{}{}", prefix, text));
            if column > 0 {
                let pad = prefix.len() + column as usize - 1;
                out.push(format!("{}^--- Error here", " ".repeat(pad)));
            }
        } else {
            out.push(format!("    {}: {}", number, text));
        }
    }
    Some(out.join("\n"))
}

/// Byte offset of a one-based line and column, clamped to the body.
pub(crate) fn byte_offset(body: &str, line: u32, column: u32) -> usize {
    let mut offset = 0;
    for (index, text) in body.split_inclusive('\n').enumerate() {
        if index + 1 == line as usize {
            let chars = column.saturating_sub(1) as usize;
            let within: usize = text.chars().take(chars).map(char::len_utf8).sum();
            return offset + within;
        }
        offset += text.len();
    }
    body.len()
}
