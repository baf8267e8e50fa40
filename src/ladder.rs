//! Degradation ladder – three progressively safer candidates for one
//! document, tried in order until a renderer accepts one.
//!
//! 1. **current** – the candidate produced upstream ([`first_candidate`]).
//! 2. **strong sanitize** – external fonts stripped, rewriter run again.
//! 3. **basic mode** – all document CSS dropped, body wrapped in one fixed,
//!    minimal stylesheet.
//!
//! Tiers 2 and 3 are both derived from tier 1 and do not depend on each other.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::css::FONT_FACE_RE;
use crate::html::{ensure_meta_charset, inject_page_css, page_css_block, sanitize_html};

/// One rung of the ladder, most faithful first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Current,
    StrongSanitize,
    BasicMode,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Current, Tier::StrongSanitize, Tier::BasicMode];

    /// Human-readable label used in logs and diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Current => "current",
            Tier::StrongSanitize => "strong sanitize",
            Tier::BasicMode => "basic mode",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate document for one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub tier: Tier,
    pub html: String,
}

impl RenderAttempt {
    pub fn label(&self) -> &'static str {
        self.tier.label()
    }
}

/// The three candidates of one document, in tier order.
#[derive(Debug, Clone)]
pub struct Ladder {
    attempts: [RenderAttempt; 3],
}

impl Ladder {
    pub fn attempts(&self) -> &[RenderAttempt] {
        &self.attempts
    }

    pub fn get(&self, tier: Tier) -> &RenderAttempt {
        &self.attempts[tier as usize]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderAttempt> {
        self.attempts.iter()
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a RenderAttempt;
    type IntoIter = std::slice::Iter<'a, RenderAttempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.iter()
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static FONT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*\bhref\s*=\s*["'][^"']*fonts[^"']*["'][^>]*>"#)
        .expect("FONT_LINK_RE: hardcoded regex is valid")
});

static WOFF_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?[^)'"]*\.woff2?(?:[?#][^)'"]*)?['"]?\s*\)"#)
        .expect("WOFF_URL_RE: hardcoded regex is valid")
});

static STYLE_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>")
        .expect("STYLE_ELEMENT_RE: hardcoded regex is valid")
});

static ANY_STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\sstyle\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)"#)
        .expect("ANY_STYLE_ATTR_RE: hardcoded regex is valid")
});

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").expect("BODY_RE: hardcoded regex is valid")
});

static HEAD_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>")
        .expect("HEAD_ELEMENT_RE: hardcoded regex is valid")
});

static DOCUMENT_SHELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!doctype[^>]*>|</?html\b[^>]*>|</?body\b[^>]*>|</?head\b[^>]*>")
        .expect("DOCUMENT_SHELL_RE: hardcoded regex is valid")
});

/// Fixed stylesheet of the basic-mode tier.
pub const BASIC_STYLESHEET: &str = "\
body { font-family: Arial, Helvetica, sans-serif; font-size: 12pt; margin: 10mm; }
img { max-width: 100%; height: auto; display: block; margin: 6px 0; }
table { width: 100%; border-collapse: collapse; table-layout: fixed; }
th, td { border: 1px solid #999; padding: 6px; word-wrap: break-word; }
h1, h2, h3 { margin: 8px 0; }
pre, code { white-space: pre-wrap; word-break: break-word; }
";

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Tier 1 candidate for a raw document: fully sanitized, or with only the
/// page CSS and charset added when sanitizing is turned off.
pub fn first_candidate(html: &str, page_css: &str, sanitize: bool) -> String {
    if sanitize {
        sanitize_html(html, page_css)
    } else {
        ensure_meta_charset(&inject_page_css(html, page_css))
    }
}

/// Build the three-tier ladder from a tier 1 candidate.
pub fn degrade(html: &str, page_css: &str) -> Ladder {
    let strong = strong_sanitize(html, page_css);
    let basic = basic_mode(html, page_css);
    log::debug!(
        "ladder built: current={}B strong={}B basic={}B",
        html.len(),
        strong.len(),
        basic.len()
    );
    Ladder {
        attempts: [
            RenderAttempt {
                tier: Tier::Current,
                html: html.to_string(),
            },
            RenderAttempt {
                tier: Tier::StrongSanitize,
                html: strong,
            },
            RenderAttempt {
                tier: Tier::BasicMode,
                html: basic,
            },
        ],
    }
}

/// Tier 2: drop every trace of external fonts, then rewrite again.
pub fn strong_sanitize(html: &str, page_css: &str) -> String {
    sanitize_html(&strip_external_fonts(html), page_css)
}

/// Remove `@font-face` blocks, font `<link>`s and `url(….woff[2])` references.
pub fn strip_external_fonts(html: &str) -> String {
    let html = FONT_FACE_RE.replace_all(html, "");
    let html = FONT_LINK_RE.replace_all(&html, "");
    WOFF_URL_RE.replace_all(&html, "").into_owned()
}

/// Tier 3: the document's body with no author CSS at all, wrapped in
/// [`BASIC_STYLESHEET`].
pub fn basic_mode(html: &str, page_css: &str) -> String {
    let stripped = STYLE_ELEMENT_RE.replace_all(html, "");
    let stripped = ANY_STYLE_ATTR_RE.replace_all(&stripped, "");
    let body = body_markup(&stripped);
    format!(
        "<html><head><meta charset=\"utf-8\">\n<style>\n{BASIC_STYLESHEET}</style>{}\n</head><body>{body}</body></html>",
        page_css_block(page_css)
    )
}

/// Inner markup of `<body>`, or the document minus its head when there is
/// no body element. Stray document-shell tags are removed either way.
fn body_markup(html: &str) -> String {
    let inner = match BODY_RE.captures(html) {
        Some(caps) => caps[1].to_string(),
        None => HEAD_ELEMENT_RE.replace_all(html, "").into_owned(),
    };
    DOCUMENT_SHELL_RE.replace_all(&inner, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::PAGE_CSS_MARKER;

    const PAGE: &str = "@page { margin-left: 10mm; margin-right: 10mm; }";

    #[test]
    fn ladder_order_and_labels() {
        let ladder = degrade("<p>x</p>", PAGE);
        let labels: Vec<_> = ladder.iter().map(RenderAttempt::label).collect();
        assert_eq!(labels, ["current", "strong sanitize", "basic mode"]);
        assert_eq!(ladder.get(Tier::Current).html, "<p>x</p>");
    }

    #[test]
    fn external_fonts_stripped() {
        let html = r#"<head><link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Inter"><style>@font-face{font-family:I;src:url(i.woff2)} p{background:url('x.woff')}</style></head>"#;
        let out = strip_external_fonts(html);
        assert!(!out.contains("fonts.googleapis"));
        assert!(!out.contains("@font-face"));
        assert!(!out.contains("woff"));
        assert!(out.contains("p{background:}"));
    }

    #[test]
    fn other_links_kept() {
        let html = r#"<link rel="stylesheet" href="print.css">"#;
        assert_eq!(strip_external_fonts(html), html);
    }

    #[test]
    fn basic_mode_drops_author_css() {
        let tier1 = first_candidate(
            r#"<html><head><style>p{color:red}</style></head><body><p style="color:blue">Hi</p></body></html>"#,
            PAGE,
            true,
        );
        let out = basic_mode(&tier1, PAGE);
        assert!(!out.contains("color:red"));
        assert!(!out.contains("color:blue"));
        assert!(out.contains("<body><p>Hi</p></body>"));
        assert!(out.contains("table-layout: fixed"));
        assert_eq!(out.matches(PAGE_CSS_MARKER).count(), 1);
    }

    #[test]
    fn basic_mode_without_body_element() {
        let out = basic_mode("<!DOCTYPE html><html><head><title>t</title></head><h1>A</h1></html>", PAGE);
        assert!(out.contains("<body><h1>A</h1></body>"));
        assert!(!out.contains("<title>"));
    }

    #[test]
    fn unsanitized_first_candidate_keeps_author_css() {
        let out = first_candidate("<div style=\"display:flex\">x</div>", PAGE, false);
        assert!(out.contains("display:flex"));
        assert!(out.contains("<meta charset"));
        assert!(out.contains(PAGE));
    }

    #[test]
    fn strong_tier_does_not_duplicate_page_css() {
        let tier1 = first_candidate("<p>x</p>", PAGE, true);
        let ladder = degrade(&tier1, PAGE);
        for attempt in &ladder {
            assert_eq!(attempt.html.matches(PAGE_CSS_MARKER).count(), 1, "{}", attempt.tier);
        }
    }

    #[test]
    fn basic_mode_drops_unquoted_style_attributes() {
        let tier1 = first_candidate("<div style=display:flex>x</div>", PAGE, false);
        assert!(tier1.contains("style=display:flex"));
        let out = basic_mode(&tier1, PAGE);
        assert!(!out.contains("display:flex"));
        assert!(out.contains("<body><div>x</div></body>"));
    }
}
