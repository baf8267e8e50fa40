//! CSS rule filter – rewrites a stylesheet blob into the subset a CSS2.1-class
//! renderer can digest.
//!
//! Every step is a lexical pass over plain text. Nothing here builds a CSS
//! tree, and nothing here can fail: malformed input produces *some* output.
//! The steps run in a fixed order (see [`sanitize_css`]); later steps rely on
//! the normalisation done by earlier ones.

use std::borrow::Cow;
use std::sync::LazyLock;

use htmlentity::entity::{decode, ICodedDataTrait};
use regex::Regex;

/// At-rule prefixes whose whole block is dropped.
pub const UNSUPPORTED_AT_RULES: &[&str] = &[
    "@media",
    "@supports",
    "@keyframes",
    "@-webkit-",
    "@-moz-",
    "@-ms-",
    "@-o-",
];

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static PSEUDO_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"::[A-Za-z0-9_-]+").expect("PSEUDO_ELEMENT_RE: hardcoded regex is valid")
});

static PSEUDO_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":[A-Za-z-]+\([^)]*\)").expect("PSEUDO_FUNCTION_RE: hardcoded regex is valid")
});

static PSEUDO_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":[A-Za-z-]+").expect("PSEUDO_CLASS_RE: hardcoded regex is valid")
});

pub(crate) static LAYOUT_DISPLAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*(?:inline-flex|inline-grid|flex|grid|contents)[^;}]*;?")
        .expect("LAYOUT_DISPLAY_RE: hardcoded regex is valid")
});

// Leading group keeps the declaration boundary so `text-transform` survives.
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[\s;{])position\s*:\s*(?:fixed|absolute)[^;}]*;?")
        .expect("POSITION_RE: hardcoded regex is valid")
});

static EFFECT_PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[\s;{])(?:-[a-z]+-)?(?:backdrop-filter|filter|box-shadow|transform(?:-[a-z]+)*|transition(?:-[a-z]+)*|animation(?:-[a-z]+)*)\s*:[^;}]*;?",
    )
    .expect("EFFECT_PROPERTY_RE: hardcoded regex is valid")
});

pub(crate) static FONT_FACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)@font-face\s*\{[^}]*\}").expect("FONT_FACE_RE: hardcoded regex is valid")
});

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full filter over one stylesheet blob.
///
/// Order: entity unescape, at-rule stripping, selector stripping, display
/// normalisation, property stripping, function neutralisation.
pub fn sanitize_css(css: &str) -> String {
    let css = unescape_entities(css);
    let css = strip_unsupported_at_rules(&css);
    let css = strip_unsupported_selectors(&css);
    let css = normalize_display(&css);
    let css = strip_unsupported_properties(&css);
    neutralize_functions(&css)
}

/// Decode HTML entities (`&quot;`, `&#39;`, `&eacute;`). Some generators
/// leave them inside CSS; the DOM parser uses this for text nodes too.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    decode(text.as_bytes())
        .to_string()
        .unwrap_or_else(|_| text.to_string())
}

/// Drop `@media`, `@supports`, `@keyframes` and vendor at-rules together
/// with their full (possibly nested) brace body.
///
/// Everything outside a recognised at-rule is copied through untouched.
pub fn strip_unsupported_at_rules(css: &str) -> String {
    let mut out = strip_at_rules_once(css);
    // Removing a rule can join its neighbours into a new at-rule prefix.
    loop {
        let next = strip_at_rules_once(&out);
        if next.len() == out.len() {
            return out;
        }
        out = next;
    }
}

fn strip_at_rules_once(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'@' && is_unsupported_at_rule(&css[i..]) {
            out.push_str(&css[copied..i]);
            i = at_rule_end(bytes, i);
            copied = i;
            continue;
        }
        i += 1;
    }
    out.push_str(&css[copied..]);
    out
}

fn is_unsupported_at_rule(rest: &str) -> bool {
    UNSUPPORTED_AT_RULES.iter().any(|prefix| {
        rest.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Byte offset just past the at-rule starting at `start`.
///
/// A `}` seen before the rule opened its own block belongs to the enclosing
/// block and is left in place.
fn at_rule_end(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    for (j, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' if depth == 0 => return j,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return j + 1;
                }
            }
            b';' if depth == 0 => return j + 1,
            _ => {}
        }
    }
    bytes.len()
}

/// Remove pseudo-elements and pseudo-classes from selector preludes and turn
/// combinators into descendant selectors.
///
/// Only text that precedes a `{` is touched; declaration bodies keep their
/// `property:value` colons.
pub fn strip_unsupported_selectors(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut segment = 0;
    for (i, c) in css.char_indices() {
        match c {
            '{' => {
                out.push_str(&clean_selector(&css[segment..i]));
                out.push('{');
                segment = i + 1;
            }
            '}' | ';' => {
                out.push_str(&css[segment..=i]);
                segment = i + 1;
            }
            _ => {}
        }
    }
    out.push_str(&css[segment..]);
    out
}

fn clean_selector(prelude: &str) -> String {
    let s = PSEUDO_ELEMENT_RE.replace_all(prelude, "");
    let s = PSEUDO_FUNCTION_RE.replace_all(&s, "");
    let s = PSEUDO_CLASS_RE.replace_all(&s, "");
    s.replace(['~', '>', '+'], " ")
}

/// `display: flex|grid|inline-flex|inline-grid|contents …;` → `display:block;`.
pub fn normalize_display(css: &str) -> String {
    LAYOUT_DISPLAY_RE
        .replace_all(css, "display:block;")
        .into_owned()
}

/// Remove positioning and visual-effect declarations plus `@font-face` blocks.
pub fn strip_unsupported_properties(css: &str) -> String {
    let css = FONT_FACE_RE.replace_all(css, "");
    let css = replace_until_stable(&POSITION_RE, &css, "${1}");
    replace_until_stable(&EFFECT_PROPERTY_RE, &css, "${1}")
}

// Adjacent declarations share a boundary character, so a single
// `replace_all` can miss every other one.
fn replace_until_stable(re: &Regex, text: &str, rep: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = match re.replace_all(&current, rep) {
            Cow::Borrowed(_) => None,
            Cow::Owned(s) => Some(s),
        };
        match next {
            Some(s) => current = s,
            None => return current,
        }
    }
}

/// Drop `var(--x)` references and collapse `calc(...)` to `1`.
pub fn neutralize_functions(css: &str) -> String {
    let css = replace_function(css, "var", "", |args| args.trim_start().starts_with("--"));
    replace_function(&css, "calc", "1", |_| true)
}

/// Replace every `name(...)` call (optionally vendor-prefixed) whose argument
/// text satisfies `accept` with `replacement`. Parentheses are balanced; an
/// unterminated call ends at the end of its declaration.
fn replace_function(
    css: &str,
    name: &str,
    replacement: &str,
    accept: impl Fn(&str) -> bool,
) -> String {
    let lower = css.to_ascii_lowercase();
    let bytes = css.as_bytes();
    let pattern = format!("{name}(");

    let mut out = String::with_capacity(css.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(found) = lower[search..].find(&pattern) {
        let name_start = search + found;
        let args_start = name_start + pattern.len();
        search = args_start;

        let Some(start) = call_start(bytes, name_start) else {
            continue;
        };
        if start < copied || !accept(&css[args_start..]) {
            continue;
        }
        let end = call_end(bytes, args_start);
        out.push_str(&css[copied..start]);
        out.push_str(replacement);
        copied = end;
        search = end;
    }
    out.push_str(&css[copied..]);
    out
}

/// Start of the function token ending at `name_start`: the name itself, or a
/// `-vendor-` prefix in front of it. `None` when the name is only the tail of
/// a longer identifier (`myvar(`).
fn call_start(bytes: &[u8], name_start: usize) -> Option<usize> {
    let mut s = name_start;
    while s > 0 && (bytes[s - 1].is_ascii_alphanumeric() || matches!(bytes[s - 1], b'-' | b'_')) {
        s -= 1;
    }
    if s == name_start {
        Some(name_start)
    } else if bytes[s] == b'-' && bytes[name_start - 1] == b'-' {
        Some(s)
    } else {
        None
    }
}

fn call_end(bytes: &[u8], args_start: usize) -> usize {
    let mut depth = 1usize;
    for (j, &b) in bytes.iter().enumerate().skip(args_start) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return j + 1;
                }
            }
            b';' | b'{' | b'}' => return j,
            _ => {}
        }
    }
    bytes.len()
}
