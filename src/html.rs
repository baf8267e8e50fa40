//! HTML style rewriter – routes every stylesheet and inline `style` attribute
//! of a document through the CSS filter and injects the page-level CSS.
//!
//! Matching is regex based on purpose: the input is arbitrary, frequently
//! broken markup, and a best-effort rewrite beats a parser that gives up.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::css::{neutralize_functions, sanitize_css, unescape_entities};

/// Attribute marking the injected page-CSS block.
pub const PAGE_CSS_MARKER: &str = "data-page-css";

/// Inline properties kept verbatim.
const INLINE_ALLOWED: &[&str] = &[
    "color",
    "background-color",
    "font-size",
    "font-family",
    "text-align",
    "width",
    "height",
];

/// Inline property prefixes kept with all their shorthand/longhand variants.
const INLINE_ALLOWED_PREFIXES: &[&str] = &["border", "padding", "margin"];

static STYLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)")
        .expect("STYLE_BLOCK_RE: hardcoded regex is valid")
});

static STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(\sstyle\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("STYLE_ATTR_RE: hardcoded regex is valid")
});

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("HEAD_OPEN_RE: hardcoded regex is valid")
});

static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</head\s*>").expect("HEAD_CLOSE_RE: hardcoded regex is valid")
});

static HTML_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<html(?:\s[^>]*)?>").expect("HTML_OPEN_RE: hardcoded regex is valid")
});

static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<meta\s+charset").expect("META_CHARSET_RE: hardcoded regex is valid")
});

const META_CHARSET: &str = "<meta charset='utf-8'>";

/// Rewrite a whole document for a CSS2.1-class renderer.
///
/// Injects `page_css` (once), filters every `<style>` body and every inline
/// `style` attribute, and guarantees a `<head>` with a `<meta charset>`.
pub fn sanitize_html(html: &str, page_css: &str) -> String {
    let html = inject_page_css(html, page_css);
    let html = rewrite_style_blocks(&html);
    let html = rewrite_inline_styles(&html);
    ensure_meta_charset(&html)
}

/// Insert the page-CSS block before the last `</head>`, or wrap the content
/// in a synthesized document when there is no head at all.
///
/// A document that already carries a page-CSS block is returned unchanged.
pub fn inject_page_css(html: &str, page_css: &str) -> String {
    if has_page_css(html) {
        return html.to_string();
    }
    let block = page_css_block(page_css);
    let html = ensure_head_open(html);
    match last_head_close(&html) {
        Some(idx) => format!("{}{}{}", &html[..idx], block, &html[idx..]),
        None => {
            log::debug!("no </head> found, synthesizing document wrapper");
            format!("<html><head>{META_CHARSET}{block}</head><body>{html}</body></html>")
        }
    }
}

fn last_head_close(html: &str) -> Option<usize> {
    HEAD_CLOSE_RE.find_iter(html).last().map(|m| m.start())
}

/// A stray `</head>` with no opening tag gets one, right after `<html>` or
/// at the very start.
fn ensure_head_open(html: &str) -> String {
    if HEAD_OPEN_RE.is_match(html) || !HEAD_CLOSE_RE.is_match(html) {
        return html.to_string();
    }
    let at = HTML_OPEN_RE.find(html).map_or(0, |m| m.end());
    format!("{}<head>{}", &html[..at], &html[at..])
}

pub(crate) fn page_css_block(page_css: &str) -> String {
    format!("<style {PAGE_CSS_MARKER}>{page_css}</style>")
}

/// Whether the document already carries an injected page-CSS block.
pub fn has_page_css(html: &str) -> bool {
    html.to_ascii_lowercase()
        .contains(&format!("<style {PAGE_CSS_MARKER}"))
}

/// Replace the body of every `<style>` element with its filtered CSS. The
/// opening tag (and its attributes) is kept.
pub fn rewrite_style_blocks(html: &str) -> String {
    STYLE_BLOCK_RE
        .replace_all(html, |caps: &Captures| {
            format!("{}{}{}", &caps[1], sanitize_css(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Filter every inline `style` attribute down to the allow-listed
/// declarations. The attribute is always kept, possibly as `style=""`;
/// unquoted values come back double-quoted.
pub fn rewrite_inline_styles(html: &str) -> String {
    STYLE_ATTR_RE
        .replace_all(html, |caps: &Captures| {
            let (raw, quote, escaped) = match (caps.get(2), caps.get(3), caps.get(4)) {
                (_, Some(m), _) => (m.as_str(), '\'', "&#39;"),
                (Some(m), _, _) | (_, _, Some(m)) => (m.as_str(), '"', "&quot;"),
                (None, None, None) => ("", '"', "&quot;"),
            };
            let value = filter_inline_style(raw).replace(quote, escaped);
            format!("{}{quote}{value}{quote}", &caps[1])
        })
        .into_owned()
}

/// Keep only allow-listed declarations of one inline style value, re-joined
/// with `"; "`. Entities are decoded first, so the result is plain CSS.
pub fn filter_inline_style(raw: &str) -> String {
    let raw = neutralize_functions(&unescape_entities(raw));
    raw.split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty() && is_allowed_declaration(decl))
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_allowed_declaration(decl: &str) -> bool {
    let Some((name, _)) = decl.split_once(':') else {
        return false;
    };
    let name = name.trim().to_ascii_lowercase();
    INLINE_ALLOWED.contains(&name.as_str())
        || INLINE_ALLOWED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Make sure the document declares its charset inside a `<head>`.
pub fn ensure_meta_charset(html: &str) -> String {
    if META_CHARSET_RE.is_match(html) {
        return html.to_string();
    }
    let html = ensure_head_open(html);
    match HEAD_OPEN_RE.find(&html) {
        Some(m) => format!("{}{META_CHARSET}{}", &html[..m.end()], &html[m.end()..]),
        None => format!("<html><head>{META_CHARSET}</head><body>{html}</body></html>"),
    }
}
