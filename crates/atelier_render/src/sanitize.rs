//! Allow-list sanitizer for SVG markup.

use atelier_interface::Sanitizer;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

const ALLOWED_TAGS: &[&str] = &[
    "svg", "g", "defs", "symbol", "use", "title", "desc", "style", "path", "circle", "rect",
    "line", "ellipse", "polygon", "polyline", "text", "tspan", "textPath", "clipPath", "mask",
    "pattern", "marker", "linearGradient", "radialGradient", "stop", "filter", "feGaussianBlur",
    "feOffset", "feMerge", "feMergeNode", "feBlend", "feColorMatrix", "feComposite", "feFlood",
    "feMorphology", "feDisplacementMap", "feTurbulence", "feDropShadow",
];

const ALLOWED_ATTRS: &[&str] = &[
    "viewBox", "xmlns", "xmlns:xlink", "version", "preserveAspectRatio", "id", "class", "style",
    "transform", "x", "y", "width", "height", "cx", "cy", "r", "rx", "ry", "fx", "fy", "x1",
    "y1", "x2", "y2", "d", "points", "pathLength", "fill", "fill-opacity", "fill-rule", "stroke",
    "stroke-width", "stroke-linecap", "stroke-linejoin", "stroke-dasharray", "stroke-dashoffset",
    "stroke-miterlimit", "stroke-opacity", "opacity", "color", "display", "visibility",
    "clip-path", "clip-rule", "mask", "filter", "paint-order", "vector-effect", "offset",
    "stop-color", "stop-opacity", "gradientUnits", "gradientTransform", "spreadMethod",
    "patternUnits", "patternContentUnits", "patternTransform", "clipPathUnits", "maskUnits",
    "maskContentUnits", "filterUnits", "primitiveUnits", "markerWidth", "markerHeight",
    "markerUnits", "refX", "refY", "orient", "marker-start", "marker-mid", "marker-end",
    "font-family", "font-size", "font-weight", "font-style", "letter-spacing", "word-spacing",
    "text-anchor", "dominant-baseline", "alignment-baseline", "baseline-shift", "dx", "dy",
    "rotate", "textLength", "lengthAdjust", "startOffset", "xml:space", "href", "xlink:href",
    "in", "in2", "result", "stdDeviation", "mode", "type", "values", "operator", "k1", "k2",
    "k3", "k4", "flood-color", "flood-opacity", "radius", "scale", "xChannelSelector",
    "yChannelSelector", "baseFrequency", "numOctaves", "seed", "stitchTiles",
];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<(/?)([A-Za-z][\w:.-]*)((?:\s+[^\s=/>"']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*(/?)>"#,
    )
    .expect("Valid tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#)
        .expect("Valid attribute regex")
});

const DROPPED_BLOCKS: &[&str] = &["script", "foreignObject", "iframe", "object", "embed"];

static DROPPED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = DROPPED_BLOCKS
        .iter()
        .map(|tag| format!(r"<{tag}\b.*?(?:</\s*{tag}\s*>|\z)"))
        .collect();
    Regex::new(&format!("(?is){}", alternatives.join("|"))).expect("Valid block regex")
});

static DOCTYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!DOCTYPE(?:[^\[>]*\[.*?\])?[^>]*>").expect("Valid doctype regex")
});

/// Sanitizer keeping a fixed set of SVG elements and attributes.
///
/// Removes scripts and embedded foreign content with their contents, drops
/// document type declarations, event handler attributes, and any reference
/// that is not a local fragment (`#id`). Unknown elements lose their tags
/// but keep their text.
///
/// # Examples
///
/// ```
/// use atelier_interface::Sanitizer;
/// use atelier_render::AllowListSanitizer;
///
/// let sanitizer = AllowListSanitizer::new();
/// let clean = sanitizer.sanitize(
///     r#"<svg onload="alert(1)"><script>alert(2)</script><circle r="4" fill="red"/></svg>"#,
/// );
/// assert_eq!(clean, r#"<svg><circle r="4" fill="red"/></svg>"#);
/// ```
#[derive(Debug, Clone)]
pub struct AllowListSanitizer {
    tags: HashSet<&'static str>,
    attrs: HashSet<&'static str>,
}

impl AllowListSanitizer {
    /// Sanitizer with the built-in allow-lists.
    pub fn new() -> Self {
        Self {
            tags: ALLOWED_TAGS.iter().copied().collect(),
            attrs: ALLOWED_ATTRS.iter().copied().collect(),
        }
    }

    fn clean_tag(&self, caps: &Captures<'_>) -> String {
        let closing = &caps[1];
        let name = &caps[2];
        if !self.tags.contains(name) {
            return String::new();
        }
        if !closing.is_empty() {
            return format!("</{}>", name);
        }

        let mut out = format!("<{}", name);
        for attr in ATTR_RE.captures_iter(&caps[3]) {
            let attr_name = &attr[1];
            let value = attr.get(2).map(|m| m.as_str()).unwrap_or("\"\"");
            if self.keeps_attribute(attr_name, value) {
                out.push(' ');
                out.push_str(attr_name);
                out.push('=');
                out.push_str(value);
            }
        }
        out.push_str(&caps[4]);
        out.push('>');
        out
    }

    fn keeps_attribute(&self, name: &str, value: &str) -> bool {
        let allowed = self.attrs.contains(name) || name.starts_with("xmlns:");
        if !allowed {
            return false;
        }
        let unquoted = value.trim_matches(|c| c == '"' || c == '\'');
        let compact: String = unquoted
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if compact.contains("javascript:") || compact.contains("expression(") {
            return false;
        }
        if name == "href" || name == "xlink:href" {
            return unquoted.trim_start().starts_with('#');
        }
        true
    }
}

impl Default for AllowListSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for AllowListSanitizer {
    fn sanitize(&self, body: &str) -> String {
        let without_doctype = DOCTYPE_RE.replace_all(body, "");
        let without_blocks = DROPPED_BLOCK_RE.replace_all(&without_doctype, "");
        TAG_RE
            .replace_all(&without_blocks, |caps: &Captures<'_>| self.clean_tag(caps))
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_allowed_markup_unchanged() {
        let sanitizer = AllowListSanitizer::new();
        let body = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><defs><linearGradient id="a"><stop offset="0" stop-color="#fff"/></linearGradient></defs><rect width="10" height="10" fill="url(#a)"/></svg>"##;
        assert_eq!(sanitizer.sanitize(body), body);
    }

    #[test]
    fn drops_external_references() {
        let sanitizer = AllowListSanitizer::new();
        let clean = sanitizer.sanitize(
            r##"<svg><use href="https://evil.example/x.svg#a"/><use xlink:href="#local"/></svg>"##,
        );
        assert_eq!(clean, r##"<svg><use/><use xlink:href="#local"/></svg>"##);
    }

    #[test]
    fn unknown_elements_keep_text() {
        let sanitizer = AllowListSanitizer::new();
        let clean = sanitizer.sanitize("<svg><text><blink>hi</blink></text></svg>");
        assert_eq!(clean, "<svg><text>hi</text></svg>");
    }

    #[test]
    fn removes_doctype_and_foreign_content() {
        let sanitizer = AllowListSanitizer::new();
        let clean = sanitizer.sanitize(
            "<!DOCTYPE svg [<!ENTITY a \"b\">]><svg><foreignObject><div>x</div></foreignObject></svg>",
        );
        assert_eq!(clean, "<svg></svg>");
    }

    #[test]
    fn strips_javascript_urls_with_whitespace() {
        let sanitizer = AllowListSanitizer::new();
        let clean =
            sanitizer.sanitize(r#"<svg><rect style="fill: url(java script:x)" width="2" /></svg>"#);
        assert_eq!(clean, r#"<svg><rect width="2"/></svg>"#);
    }
}
