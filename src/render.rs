//! PDF renderer – the in-crate CSS2.1-class engine.
//!
//! [`NativeRenderer`] parses, lays out and paints a document with builtin
//! PDF fonts via `printpdf` (v0.8 ops-based API). In strict mode it refuses
//! documents whose CSS still carries constructs such an engine cannot
//! process, which is what drives the degradation ladder.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use printpdf::*;
use regex::Regex;

use crate::attempt::Renderer;
use crate::css::{LAYOUT_DISPLAY_RE, UNSUPPORTED_AT_RULES};
use crate::dom::{parse_html, stylesheets, DomNode, ElementNode, Tag};
use crate::error::RenderFailure;
use crate::layout::{image_dimensions, layout_document, PageGeometry};
use crate::layout_config::{BoxContent, DocumentLayout, LayoutBox, TextContent};
use crate::pipeline::PipelineConfig;

const PT_TO_MM: f32 = 0.352778;

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NativeRenderer {
    geometry: PageGeometry,
    title: String,
    strict: bool,
}

impl NativeRenderer {
    /// Strict renderer for the config's page size and margins.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            geometry: PageGeometry::from_config(config),
            title: config.title.clone(),
            strict: true,
        }
    }

    /// Toggle rejection of unsupported CSS.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }
}

impl Renderer for NativeRenderer {
    fn render(&self, html: &str, base_path: &Path) -> Result<Vec<u8>, RenderFailure> {
        let dom = parse_html(html);
        if self.strict {
            let problems = unsupported_constructs(&dom);
            if !problems.is_empty() {
                return Err(RenderFailure::new(
                    problems.join("\n"),
                    Some(format!("{} unsupported CSS construct(s)", problems.len())),
                ));
            }
        }
        let layout = layout_document(&dom, &self.geometry, &self.title, Some(base_path));
        Ok(render_pdf(&layout))
    }
}

// ---------------------------------------------------------------------------
// Strict-mode checks
// ---------------------------------------------------------------------------

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvar\s*\(").expect("VAR_RE: hardcoded regex is valid")
});

static CALC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9_-])(?:-[a-z]+-)?calc\s*\(")
        .expect("CALC_RE: hardcoded regex is valid")
});

static WEBFONT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^)'"]*\.woff2?)"#)
        .expect("WEBFONT_URL_RE: hardcoded regex is valid")
});

/// Every CSS construct in the document a CSS2.1-class engine would choke
/// on, one human-readable line each.
pub fn unsupported_constructs(dom: &[DomNode]) -> Vec<String> {
    let mut problems = Vec::new();

    for (i, sheet) in stylesheets(dom).iter().enumerate() {
        let origin = format!("<style> #{}", i + 1);
        check_declarations(sheet, &origin, &mut problems);

        let lower = sheet.to_ascii_lowercase();
        for rule in UNSUPPORTED_AT_RULES {
            if lower.contains(rule) {
                note(&mut problems, format!("{origin}: unsupported at-rule `{rule}`"));
            }
        }
        if sheet.contains("::") {
            note(&mut problems, format!("{origin}: pseudo-element selector"));
        }
        let (open, close) = (sheet.matches('{').count(), sheet.matches('}').count());
        if open != close {
            note(
                &mut problems,
                format!("{origin}: unbalanced braces ({open} opening, {close} closing)"),
            );
        }
    }

    walk_elements(dom, &mut |elem| {
        if let Some(style) = elem.inline_style() {
            check_declarations(style, "inline style", &mut problems);
        }
        if elem.tag == Tag::Link {
            if let Some(href) = elem.attr("href").filter(|h| h.contains("fonts")) {
                note(&mut problems, format!("<link>: external web font `{href}`"));
            }
        }
    });

    problems
}

fn check_declarations(css: &str, origin: &str, problems: &mut Vec<String>) {
    if let Some(m) = LAYOUT_DISPLAY_RE.find(css) {
        let decl = m.as_str().trim_end_matches(';').trim();
        note(problems, format!("{origin}: unsupported `{decl}`"));
    }
    if VAR_RE.is_match(css) {
        note(problems, format!("{origin}: custom property reference var()"));
    }
    if CALC_RE.is_match(css) {
        note(problems, format!("{origin}: calc() expression"));
    }
    if let Some(caps) = WEBFONT_URL_RE.captures(css) {
        note(problems, format!("{origin}: external web font `{}`", &caps[1]));
    }
}

fn note(problems: &mut Vec<String>, problem: String) {
    if !problems.contains(&problem) {
        problems.push(problem);
    }
}

fn walk_elements(nodes: &[DomNode], visit: &mut dyn FnMut(&ElementNode)) {
    for node in nodes {
        if let DomNode::Element(e) = node {
            visit(e);
            walk_elements(&e.children, visit);
        }
    }
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Paint a frozen layout into PDF bytes.
///
/// Images printpdf cannot decode are skipped with a warning.
pub fn render_pdf(layout: &DocumentLayout) -> Vec<u8> {
    let page_w = Mm(layout.page_width_pt * PT_TO_MM);
    let page_h = Mm(layout.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&layout.title);

    let mut images: HashMap<&str, ImageResource> = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    for (src, bytes) in &layout.images {
        let (px_width, px_height) = match image_dimensions(bytes) {
            Ok(dims) => dims,
            Err(e) => {
                log::warn!("skipping image: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(bytes, &mut warnings) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("skipping image: PDF encode error: {e}");
                continue;
            }
        };
        images.insert(
            src.as_str(),
            ImageResource {
                xobj_id: doc.add_image(&raw),
                px_width,
                px_height,
            },
        );
    }

    let mut pages: Vec<PdfPage> = layout
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for lbox in &page.boxes {
                paint_box(&mut ops, lbox, layout.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    doc.save(&PdfSaveOptions::default(), &mut Vec::new())
}

fn rgb(c: [f32; 3]) -> Color {
    Color::Rgb(printpdf::Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a box in PDF space (origin bottom-left).
fn corners(lbox: &LayoutBox, page_height: f32) -> Vec<LinePoint> {
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let (left, right) = (lbox.x, lbox.x + lbox.width);
    vec![
        point(left, bottom),
        point(right, bottom),
        point(right, top),
        point(left, top),
    ]
}

fn paint_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<&str, ImageResource>,
) {
    match &lbox.content {
        BoxContent::Fill { color } => {
            ops.push(Op::SetFillColor { col: rgb(*color) });
            ops.push(Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing {
                        points: corners(lbox, page_height),
                    }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            });
        }
        BoxContent::Border { color, width } => {
            ops.push(Op::SetOutlineColor { col: rgb(*color) });
            ops.push(Op::SetOutlineThickness { pt: Pt(*width) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: corners(lbox, page_height),
                    is_closed: true,
                },
            });
        }
        BoxContent::Rule { color, width } => {
            let y = page_height - lbox.y;
            ops.push(Op::SetOutlineColor { col: rgb(*color) });
            ops.push(Op::SetOutlineThickness { pt: Pt(*width) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![point(lbox.x, y), point(lbox.x + lbox.width, y)],
                    is_closed: false,
                },
            });
        }
        BoxContent::Text(text) => paint_text(ops, lbox, text, page_height),
        BoxContent::Image { src } => {
            let Some(res) = images.get(src.as_str()) else {
                return;
            };
            // At dpi=72 printpdf maps 1 px to 1 pt.
            let scale_x = lbox.width / res.px_width.max(1) as f32;
            let scale_y = lbox.height / res.px_height.max(1) as f32;
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(page_height - lbox.y - lbox.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

fn builtin_font(text: &TextContent) -> BuiltinFont {
    match (text.monospace, text.bold, text.italic) {
        (true, true, true) => BuiltinFont::CourierBoldOblique,
        (true, true, false) => BuiltinFont::CourierBold,
        (true, false, true) => BuiltinFont::CourierOblique,
        (true, false, false) => BuiltinFont::Courier,
        (false, true, true) => BuiltinFont::HelveticaBoldOblique,
        (false, true, false) => BuiltinFont::HelveticaBold,
        (false, false, true) => BuiltinFont::HelveticaOblique,
        (false, false, false) => BuiltinFont::Helvetica,
    }
}

fn paint_text(ops: &mut Vec<Op>, lbox: &LayoutBox, text: &TextContent, page_height: f32) {
    let font = builtin_font(text);
    let top = page_height - lbox.y;
    // Baseline ≈ line top + ascender (0.75 × font size), centred in the line box.
    let baseline_drop = text.font_size * 0.75 + (text.line_height - text.font_size) / 2.0;

    for line in &text.lines {
        if line.text.is_empty() {
            continue;
        }
        let x = lbox.x + line.x_offset;
        let y = top - line.y_offset - baseline_drop;

        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(x), y: Pt(y) },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(text.font_size),
            font,
        });
        ops.push(Op::SetLineHeight {
            lh: Pt(text.line_height),
        });
        ops.push(Op::SetFillColor { col: rgb(text.color) });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_winlatin(&line.text))],
            font,
        });
        ops.push(Op::EndTextSection);

        if text.underline {
            let underline_y = y - text.font_size * 0.1;
            ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
            ops.push(Op::SetOutlineColor { col: rgb(text.color) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![point(x, underline_y), point(x + line.width, underline_y)],
                    is_closed: false,
                },
            });
        }
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0xFF; printpdf passes these
    // bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}
