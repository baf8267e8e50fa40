//! Layout – block flow of the parsed DOM onto fixed-size pages.
//!
//! A deliberately small CSS2.1-era model: blocks stack vertically, text is
//! word-wrapped with builtin Helvetica metrics, tables use fixed layout with
//! equal columns, and only inline `style` attributes are honoured
//! (stylesheets are ignored apart from the strict-mode checks in
//! [`crate::render`]).
//!
//! A run of inline content takes the style in effect where the run starts.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::dom::{body_children, parse_html, DomNode, ElementNode, Tag};
use crate::layout_config::*;
use crate::pipeline::PipelineConfig;
use crate::source::parse_data_uri;

/// Top and bottom page margin in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

const LINE_HEIGHT: f32 = 1.3;
const PARAGRAPH_GAP: f32 = 6.0;
const LIST_INDENT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;
const BASE_FONT_SIZE: f32 = 11.0;
const CSS_PX_TO_PT: f32 = 0.75;

const HEADING_SIZES: [f32; 6] = [22.0, 18.0, 15.0, 13.0, 12.0, 11.0];
const LINK_BLUE: Rgb = [0.0, 0.2, 0.6];
const HEADER_CELL_FILL: Rgb = [0.93, 0.93, 0.93];
const GRID_GRAY: Rgb = [0.6, 0.6, 0.6];

/// Page size and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// Left and right margin.
    pub margin_x: f32,
    /// Top and bottom margin.
    pub margin_y: f32,
}

impl PageGeometry {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            width: config.effective_width(),
            height: config.effective_height(),
            margin_x: config.margin_pt(),
            margin_y: PAGE_MARGIN_PT,
        }
    }

    pub fn content_width(&self) -> f32 {
        (self.width - 2.0 * self.margin_x).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - 2.0 * self.margin_y).max(1.0)
    }

    fn bottom(&self) -> f32 {
        self.height - self.margin_y
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Text style
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
struct TextStyle {
    font_size: f32,
    bold: bool,
    italic: bool,
    monospace: bool,
    underline: bool,
    color: Rgb,
    /// Not inherited.
    background: Option<Rgb>,
    align: Align,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: BASE_FONT_SIZE,
            bold: false,
            italic: false,
            monospace: false,
            underline: false,
            color: BLACK,
            background: None,
            align: Align::Left,
        }
    }
}

impl TextStyle {
    fn line_height(&self) -> f32 {
        self.font_size * LINE_HEIGHT
    }

    /// Style of `elem` given its parent's: tag defaults, then inline style.
    fn for_element(&self, elem: &ElementNode) -> TextStyle {
        let mut style = TextStyle {
            background: None,
            ..self.clone()
        };
        match elem.tag {
            Tag::Heading(level) => {
                style.font_size = HEADING_SIZES[usize::from(level.clamp(1, 6) - 1)];
                style.bold = true;
            }
            Tag::Strong | Tag::Th => style.bold = true,
            Tag::Em => style.italic = true,
            Tag::U => style.underline = true,
            Tag::A => {
                style.underline = true;
                style.color = LINK_BLUE;
            }
            Tag::Code | Tag::Pre => style.monospace = true,
            _ => {}
        }
        if let Some(css) = elem.inline_style() {
            style.apply_declarations(css, self.font_size);
        }
        style
    }

    fn apply_declarations(&mut self, css: &str, parent_size: f32) {
        for decl in css.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let value = value.trim().trim_end_matches("!important").trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "color" => {
                    if let Some(c) = parse_color(value) {
                        self.color = c;
                    }
                }
                "background-color" | "background" => {
                    if let Some(c) = parse_color(value) {
                        self.background = Some(c);
                    }
                }
                "font-size" => {
                    if let Some(size) = parse_font_size(value, parent_size) {
                        self.font_size = size.clamp(4.0, 96.0);
                    }
                }
                "font-weight" => {
                    let v = value.to_ascii_lowercase();
                    self.bold = v == "bold"
                        || v == "bolder"
                        || v.parse::<u32>().is_ok_and(|w| w >= 600);
                }
                "font-style" => {
                    let v = value.to_ascii_lowercase();
                    self.italic = v == "italic" || v == "oblique";
                }
                "text-decoration" => {
                    self.underline = value.to_ascii_lowercase().contains("underline");
                }
                "text-align" => {
                    self.align = match value.to_ascii_lowercase().as_str() {
                        "center" => Align::Center,
                        "right" | "end" => Align::Right,
                        _ => Align::Left,
                    };
                }
                _ => {}
            }
        }
    }

    /// Average glyph advance as a fraction of the font size.
    fn advance_factor(&self) -> f32 {
        if self.monospace {
            0.6
        } else if self.bold {
            0.55
        } else {
            0.5
        }
    }

    fn measure(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * self.advance_factor()
    }
}

fn parse_color(value: &str) -> Option<Rgb> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(hex) = v.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        let (r, g, b) = match digits.as_slice() {
            [r, g, b] | [r, g, b, _] => (r * 17, g * 17, b * 17),
            [r1, r2, g1, g2, b1, b2] | [r1, r2, g1, g2, b1, b2, _, _] => {
                (r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)
            }
            _ => return None,
        };
        return Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]);
    }
    if let Some(args) = v
        .strip_prefix("rgba(")
        .or_else(|| v.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<f32> = args
            .split(',')
            .take(3)
            .map(|p| p.trim().parse::<f32>().ok())
            .collect::<Option<_>>()?;
        if let [r, g, b] = parts.as_slice() {
            return Some([r / 255.0, g / 255.0, b / 255.0].map(|c| c.clamp(0.0, 1.0)));
        }
        return None;
    }
    let named = match v.as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "navy" => [0, 0, 128],
        "maroon" => [128, 0, 0],
        "orange" => [255, 165, 0],
        "yellow" => [255, 255, 0],
        "purple" => [128, 0, 128],
        "teal" => [0, 128, 128],
        _ => return None,
    };
    Some(named.map(|c: u8| c as f32 / 255.0))
}

/// Font size in points from a CSS length.
fn parse_font_size(value: &str, parent: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let number = |suffix: &str| v.strip_suffix(suffix)?.trim().parse::<f32>().ok();
    if let Some(n) = number("px") {
        return Some(n * CSS_PX_TO_PT);
    }
    if let Some(n) = number("pt") {
        return Some(n);
    }
    if let Some(n) = number("rem") {
        return Some(n * BASE_FONT_SIZE);
    }
    if let Some(n) = number("em") {
        return Some(n * parent);
    }
    if let Some(n) = number("%") {
        return Some(n / 100.0 * parent);
    }
    match v.as_str() {
        "small" => Some(BASE_FONT_SIZE * 0.85),
        "large" => Some(BASE_FONT_SIZE * 1.2),
        "x-large" => Some(BASE_FONT_SIZE * 1.5),
        _ => v.parse::<f32>().ok().map(|n| n * CSS_PX_TO_PT),
    }
}

/// A CSS length in points (`px`, `pt` or a bare number of pixels).
fn parse_length(value: &str) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(n) = v.strip_suffix("px") {
        return n.trim().parse::<f32>().ok().map(|n| n * CSS_PX_TO_PT);
    }
    if let Some(n) = v.strip_suffix("pt") {
        return n.trim().parse::<f32>().ok();
    }
    v.parse::<f32>().ok().map(|n| n * CSS_PX_TO_PT)
}

// ---------------------------------------------------------------------------
// Text wrapping
// ---------------------------------------------------------------------------

/// Word-wrap text to fit within `max_width` points. Explicit newlines start
/// new lines; words longer than a line are broken by characters.
fn wrap_text(text: &str, style: &TextStyle, max_width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if style.measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if style.measure(word) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = hard_wrap(word, style, max_width);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(current);
    }
    lines
}

/// Break text into lines of at most `max_width`, by characters.
fn hard_wrap(text: &str, style: &TextStyle, max_width: f32) -> Vec<String> {
    let per_line = ((max_width / (style.font_size * style.advance_factor())) as usize).max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(per_line)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Lay out a parsed document.
///
/// `base_path` resolves relative image sources; `None` skips them.
pub fn layout_document(
    nodes: &[DomNode],
    geometry: &PageGeometry,
    title: &str,
    base_path: Option<&Path>,
) -> DocumentLayout {
    let mut flow = Flow::new(geometry, title, base_path);
    let body = body_children(nodes);
    flow.walk(&body, &TextStyle::default(), 0.0);
    flow.finish()
}

/// Parse and lay out an HTML string.
pub fn layout_html(
    html: &str,
    geometry: &PageGeometry,
    title: &str,
    base_path: Option<&Path>,
) -> DocumentLayout {
    layout_document(&parse_html(html), geometry, title, base_path)
}

struct Flow<'a> {
    geo: &'a PageGeometry,
    base_path: Option<&'a Path>,
    layout: DocumentLayout,
    page: PageLayout,
    /// Y of the next box, from the page top.
    cursor: f32,
    /// Pending inline text and the style it started with.
    inline: String,
    inline_style: TextStyle,
    /// List marker for the next text placed, with its indent.
    marker: Option<String>,
}

impl<'a> Flow<'a> {
    fn new(geo: &'a PageGeometry, title: &str, base_path: Option<&'a Path>) -> Self {
        Self {
            geo,
            base_path,
            layout: DocumentLayout::new(title, geo.width, geo.height),
            page: PageLayout::default(),
            cursor: geo.margin_y,
            inline: String::new(),
            inline_style: TextStyle::default(),
            marker: None,
        }
    }

    fn finish(mut self) -> DocumentLayout {
        self.flush_inline(0.0);
        if !self.page.boxes.is_empty() || self.layout.pages.is_empty() {
            self.layout.pages.push(std::mem::take(&mut self.page));
        }
        log::debug!("layout: {} page(s)", self.layout.pages.len());
        self.layout
    }

    fn at_page_top(&self) -> bool {
        self.cursor <= self.geo.margin_y
    }

    fn new_page(&mut self) {
        self.layout.pages.push(std::mem::take(&mut self.page));
        self.cursor = self.geo.margin_y;
    }

    /// Start a new page unless `height` still fits on this one.
    fn ensure_space(&mut self, height: f32) {
        if self.cursor + height > self.geo.bottom() && !self.at_page_top() {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if !self.at_page_top() {
            self.cursor = (self.cursor + height).min(self.geo.bottom());
        }
    }

    fn push(&mut self, x: f32, y: f32, width: f32, height: f32, content: BoxContent) {
        self.page.boxes.push(LayoutBox::new(x, y, width, height, content));
    }

    fn walk(&mut self, nodes: &[DomNode], style: &TextStyle, indent: f32) {
        for node in nodes {
            match node {
                DomNode::Text(text) => self.push_inline(text, style),
                DomNode::Element(elem) => self.element(elem, style, indent),
            }
        }
    }

    fn push_inline(&mut self, text: &str, style: &TextStyle) {
        if self.inline.trim().is_empty() {
            if text.trim().is_empty() {
                return;
            }
            self.inline_style = style.clone();
        }
        self.inline.push_str(text);
    }

    fn flush_inline(&mut self, indent: f32) {
        let text = std::mem::take(&mut self.inline);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let style = self.inline_style.clone();
        self.place_text(text, &style, indent);
    }

    fn element(&mut self, elem: &ElementNode, parent: &TextStyle, indent: f32) {
        if elem.tag.is_hidden() {
            return;
        }
        let style = parent.for_element(elem);
        match &elem.tag {
            Tag::Br => {
                if self.inline.trim().is_empty() {
                    self.inline_style = style;
                }
                self.inline.push('\n');
            }
            tag if !tag.is_block() => self.walk(&elem.children, &style, indent),
            Tag::Heading(_) => {
                self.flush_inline(indent);
                self.gap(PARAGRAPH_GAP + 2.0);
                self.block(elem, &style, indent);
                self.gap(PARAGRAPH_GAP / 2.0);
            }
            Tag::P => {
                self.flush_inline(indent);
                self.block(elem, &style, indent);
                self.gap(PARAGRAPH_GAP);
            }
            Tag::Ul | Tag::Ol => {
                self.flush_inline(indent);
                self.list(elem, &style, indent);
                self.gap(PARAGRAPH_GAP);
            }
            Tag::Pre => {
                self.flush_inline(indent);
                self.preformatted(elem, &style, indent);
                self.gap(PARAGRAPH_GAP);
            }
            Tag::Table => {
                self.flush_inline(indent);
                self.table(elem, &style, indent);
                self.gap(PARAGRAPH_GAP);
            }
            Tag::Img => {
                self.flush_inline(indent);
                self.image(elem, indent);
            }
            Tag::Hr => {
                self.flush_inline(indent);
                self.ensure_space(8.0);
                let x = self.geo.margin_x + indent;
                let width = self.geo.content_width() - indent;
                self.push(x, self.cursor + 4.0, width, 0.0, BoxContent::Rule { color: GRID_GRAY, width: 0.75 });
                self.cursor += 8.0;
            }
            _ => {
                self.flush_inline(indent);
                self.block(elem, &style, indent);
            }
        }
    }

    /// Generic block: children, then whatever inline text is pending.
    fn block(&mut self, elem: &ElementNode, style: &TextStyle, indent: f32) {
        self.walk(&elem.children, style, indent);
        self.flush_inline(indent);
    }

    fn list(&mut self, list: &ElementNode, style: &TextStyle, indent: f32) {
        let ordered = list.tag == Tag::Ol;
        let mut number: i64 = list
            .attr("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);
        for child in &list.children {
            match child {
                DomNode::Element(item) if item.tag == Tag::Li => {
                    let marker = if ordered {
                        format!("{number}.")
                    } else {
                        "\u{2022}".to_string()
                    };
                    number += 1;
                    self.marker = Some(marker);
                    let item_style = style.for_element(item);
                    self.block(item, &item_style, indent + LIST_INDENT);
                    self.marker = None;
                }
                other => self.walk(std::slice::from_ref(other), style, indent + LIST_INDENT),
            }
        }
        self.flush_inline(indent + LIST_INDENT);
    }

    fn place_text(&mut self, text: &str, style: &TextStyle, indent: f32) {
        let x = self.geo.margin_x + indent;
        let width = self.geo.content_width() - indent;
        let lines = wrap_text(text, style, width);
        self.place_lines(lines, style, x, width);
    }

    /// Place pre-wrapped lines, splitting them across pages as needed.
    fn place_lines(&mut self, lines: Vec<String>, style: &TextStyle, x: f32, width: f32) {
        let line_h = style.line_height();
        let mut chunk: Vec<TextLine> = Vec::new();
        let mut chunk_top = self.cursor;

        for line in lines {
            if self.cursor + line_h > self.geo.bottom() && !self.at_page_top() {
                self.emit_text(chunk_top, x, width, std::mem::take(&mut chunk), style);
                self.new_page();
                chunk_top = self.cursor;
            }
            let line_w = style.measure(&line);
            let x_offset = match style.align {
                Align::Left => 0.0,
                Align::Center => ((width - line_w) / 2.0).max(0.0),
                Align::Right => (width - line_w).max(0.0),
            };
            chunk.push(TextLine {
                text: line,
                x_offset,
                y_offset: self.cursor - chunk_top,
                width: line_w,
            });
            self.cursor += line_h;
        }
        self.emit_text(chunk_top, x, width, chunk, style);
    }

    fn emit_text(&mut self, top: f32, x: f32, width: f32, lines: Vec<TextLine>, style: &TextStyle) {
        if lines.is_empty() {
            return;
        }
        let height = lines.len() as f32 * style.line_height();
        if let Some(color) = style.background {
            self.push(x, top, width, height, BoxContent::Fill { color });
        }
        if let Some(marker) = self.marker.take() {
            let marker_style = TextStyle {
                underline: false,
                background: None,
                align: Align::Left,
                ..style.clone()
            };
            let marker_w = marker_style.measure(&marker);
            self.push(
                x - LIST_INDENT + 4.0,
                top,
                marker_w,
                style.line_height(),
                BoxContent::Text(text_content(vec![TextLine {
                    text: marker,
                    x_offset: 0.0,
                    y_offset: 0.0,
                    width: marker_w,
                }], &marker_style)),
            );
        }
        self.push(x, top, width, height, BoxContent::Text(text_content(lines, style)));
    }

    fn preformatted(&mut self, pre: &ElementNode, style: &TextStyle, indent: f32) {
        let x = self.geo.margin_x + indent;
        let width = self.geo.content_width() - indent;
        let raw = pre.text_content();
        let raw = raw.strip_prefix('\n').unwrap_or(&raw);
        let lines: Vec<String> = raw
            .trim_end()
            .split('\n')
            .flat_map(|line| hard_wrap(&line.replace('\t', "    "), style, width))
            .collect();
        self.place_lines(lines, style, x, width);
    }

    fn table(&mut self, table: &ElementNode, style: &TextStyle, indent: f32) {
        let rows = table_rows(table);
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let x0 = self.geo.margin_x + indent;
        let col_w = (self.geo.content_width() - indent) / columns as f32;
        let text_w = (col_w - 2.0 * CELL_PADDING).max(1.0);

        for row in rows {
            let cells: Vec<(TextStyle, Vec<String>, bool)> = row
                .iter()
                .map(|cell| {
                    let cell_style = style.for_element(cell);
                    let text = cell.text_content();
                    let lines = wrap_text(text.trim(), &cell_style, text_w);
                    (cell_style, lines, cell.tag == Tag::Th)
                })
                .collect();
            let row_h = cells
                .iter()
                .map(|(s, lines, _)| lines.len().max(1) as f32 * s.line_height())
                .fold(0.0_f32, f32::max)
                + 2.0 * CELL_PADDING;

            self.ensure_space(row_h);
            let top = self.cursor;
            for (i, (cell_style, lines, header)) in cells.into_iter().enumerate() {
                let x = x0 + i as f32 * col_w;
                let fill = cell_style.background.or(header.then_some(HEADER_CELL_FILL));
                if let Some(color) = fill {
                    self.push(x, top, col_w, row_h, BoxContent::Fill { color });
                }
                let line_h = cell_style.line_height();
                let text_lines: Vec<TextLine> = lines
                    .into_iter()
                    .enumerate()
                    .map(|(n, text)| {
                        let w = cell_style.measure(&text);
                        let x_offset = match cell_style.align {
                            Align::Left => 0.0,
                            Align::Center => ((text_w - w) / 2.0).max(0.0),
                            Align::Right => (text_w - w).max(0.0),
                        };
                        TextLine {
                            text,
                            x_offset,
                            y_offset: n as f32 * line_h,
                            width: w,
                        }
                    })
                    .collect();
                let text_h = text_lines.len() as f32 * line_h;
                self.push(
                    x + CELL_PADDING,
                    top + CELL_PADDING,
                    text_w,
                    text_h,
                    BoxContent::Text(text_content(text_lines, &cell_style)),
                );
                self.push(x, top, col_w, row_h, BoxContent::Border { color: GRID_GRAY, width: 0.5 });
            }
            self.cursor = top + row_h;
        }
    }

    fn image(&mut self, img: &ElementNode, indent: f32) {
        let Some(src) = img.src().map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        let bytes = match self.resolve_image(src) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("skipping image: {e}");
                return;
            }
        };
        let (px_w, px_h) = match image_dimensions(&bytes) {
            Ok(dims) => dims,
            Err(e) => {
                log::warn!("skipping image: {e}");
                return;
            }
        };
        if px_w == 0 || px_h == 0 {
            return;
        }

        let declared = |name: &str| {
            img.attr(name).and_then(parse_length).or_else(|| {
                img.inline_style().and_then(|css| {
                    css.split(';').find_map(|d| {
                        let (k, v) = d.split_once(':')?;
                        (k.trim().eq_ignore_ascii_case(name)).then(|| parse_length(v)).flatten()
                    })
                })
            })
        };
        let aspect = px_h as f32 / px_w as f32;
        let (mut w, mut h) = match (declared("width"), declared("height")) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * aspect),
            (None, Some(h)) => (h / aspect, h),
            (None, None) => (px_w as f32 * CSS_PX_TO_PT, px_h as f32 * CSS_PX_TO_PT),
        };
        let avail_w = self.geo.content_width() - indent;
        if w > avail_w {
            h *= avail_w / w;
            w = avail_w;
        }
        let avail_h = self.geo.content_height();
        if h > avail_h {
            w *= avail_h / h;
            h = avail_h;
        }

        self.ensure_space(h);
        let x = self.geo.margin_x + indent;
        self.push(x, self.cursor, w, h, BoxContent::Image { src: src.to_string() });
        self.cursor += h + 4.0;
        self.layout.images.entry(src.to_string()).or_insert(bytes);
    }

    fn resolve_image(&self, src: &str) -> Result<Vec<u8>, String> {
        if src.starts_with("data:") {
            return parse_data_uri(src);
        }
        if src.contains("://") || src.starts_with("//") {
            return Err(format!("remote image `{src}` is not fetched"));
        }
        let Some(base) = self.base_path else {
            return Err(format!("relative image `{src}` has no working directory"));
        };
        let relative = src.split(['?', '#']).next().unwrap_or(src);
        let path = base.join(relative.trim_start_matches("file:"));
        fs::read(&path).map_err(|e| format!("cannot read `{}`: {e}", path.display()))
    }
}

fn text_content(lines: Vec<TextLine>, style: &TextStyle) -> TextContent {
    TextContent {
        lines,
        font_size: style.font_size,
        line_height: style.line_height(),
        bold: style.bold,
        italic: style.italic,
        monospace: style.monospace,
        underline: style.underline,
        color: style.color,
    }
}

/// Rows of a table, looking through `thead`/`tbody`/`tfoot`.
fn table_rows(table: &ElementNode) -> Vec<Vec<&ElementNode>> {
    fn collect<'n>(nodes: &'n [DomNode], rows: &mut Vec<Vec<&'n ElementNode>>) {
        for node in nodes {
            let DomNode::Element(e) = node else { continue };
            match &e.tag {
                Tag::Tr => rows.push(
                    e.children
                        .iter()
                        .filter_map(|c| match c {
                            DomNode::Element(cell) if matches!(cell.tag, Tag::Td | Tag::Th) => Some(cell),
                            _ => None,
                        })
                        .collect(),
                ),
                Tag::Block(name) if matches!(name.as_str(), "thead" | "tbody" | "tfoot") => {
                    collect(&e.children, rows)
                }
                _ => {}
            }
        }
    }
    let mut rows = Vec::new();
    collect(&table.children, &mut rows);
    rows
}

pub(crate) fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("unreadable image: {e}"))?
        .into_dimensions()
        .map_err(|e| format!("undecodable image: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(layout: &DocumentLayout) -> Vec<String> {
        layout
            .pages
            .iter()
            .flat_map(|p| p.text_lines())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn layout_simple_paragraph() {
        let layout = layout_html("<h1>Title</h1><p>Hello world</p>", &PageGeometry::default(), "t", None);
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(lines_of(&layout), ["Title", "Hello world"]);
        let heading = layout.pages[0].boxes[0].text().unwrap();
        assert!(heading.bold);
        assert_eq!(heading.font_size, 22.0);
    }

    #[test]
    fn word_wrap_basic() {
        let style = TextStyle::default();
        let lines = wrap_text("Hello world foo bar", &style, 40.0);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
        let long = wrap_text(&"x".repeat(100), &style, 55.0);
        assert!(long.len() > 1);
        assert!(long.iter().all(|l| style.measure(l) <= 55.0));
    }

    #[test]
    fn long_document_paginates() {
        let html: String = (0..200).map(|i| format!("<p>Paragraph {i}</p>")).collect();
        let layout = layout_html(&html, &PageGeometry::default(), "t", None);
        assert!(layout.pages.len() > 1);
        let geo = PageGeometry::default();
        for page in &layout.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= geo.height - geo.margin_y + 0.01);
            }
        }
        assert_eq!(lines_of(&layout).len(), 200);
    }

    #[test]
    fn table_cells_get_equal_columns() {
        let html = "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>";
        let geo = PageGeometry::default();
        let layout = layout_html(html, &geo, "t", None);
        let borders: Vec<_> = layout.pages[0]
            .boxes
            .iter()
            .filter(|b| matches!(b.content, BoxContent::Border { .. }))
            .collect();
        assert_eq!(borders.len(), 4);
        assert!((borders[0].width - geo.content_width() / 2.0).abs() < 0.01);
        assert_eq!(lines_of(&layout), ["A", "B", "1", "2"]);
    }

    #[test]
    fn inline_styles_honoured() {
        let html = r#"<p style="color:#ff0000; font-size:20px; text-align:center; background-color:rgb(0,0,255)">x</p>"#;
        let layout = layout_html(html, &PageGeometry::default(), "t", None);
        let boxes = &layout.pages[0].boxes;
        assert!(matches!(boxes[0].content, BoxContent::Fill { color } if color == [0.0, 0.0, 1.0]));
        let text = boxes[1].text().unwrap();
        assert_eq!(text.color, [1.0, 0.0, 0.0]);
        assert_eq!(text.font_size, 15.0);
        assert!(text.lines[0].x_offset > 0.0);
    }

    #[test]
    fn lists_get_markers() {
        let layout = layout_html("<ol start=\"3\"><li>a</li><li>b</li></ol><ul><li>c</li></ul>", &PageGeometry::default(), "t", None);
        assert_eq!(lines_of(&layout), ["3.", "a", "4.", "b", "\u{2022}", "c"]);
    }

    #[test]
    fn data_uri_image_is_registered() {
        let img = image::RgbImage::from_pixel(40, 20, image::Rgb([0, 0, 0]));
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let src = crate::source::data_uri("image/png", png.get_ref());
        let layout = layout_html(&format!("<img src=\"{src}\">"), &PageGeometry::default(), "t", None);
        let b = &layout.pages[0].boxes[0];
        assert!(matches!(b.content, BoxContent::Image { .. }));
        assert_eq!((b.width, b.height), (30.0, 15.0));
        assert!(layout.images.contains_key(&src));
    }

    #[test]
    fn missing_images_are_skipped() {
        let layout = layout_html("<img src=\"https://example.com/a.png\"><img src=\"local.png\"><p>x</p>", &PageGeometry::default(), "t", None);
        assert!(layout.images.is_empty());
        assert_eq!(lines_of(&layout), ["x"]);
    }

    #[test]
    fn preformatted_keeps_lines() {
        let layout = layout_html("<pre>\nfn main() {\n    run();\n}\n</pre>", &PageGeometry::default(), "t", None);
        assert_eq!(lines_of(&layout), ["fn main() {", "    run();", "}"]);
        assert!(layout.pages[0].boxes[0].text().unwrap().monospace);
    }

    #[test]
    fn colors_parse() {
        assert_eq!(parse_color("#fff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_color("navy"), Some([0.0, 0.0, 128.0 / 255.0]));
        assert_eq!(parse_color("var(--x)"), None);
        assert_eq!(parse_font_size("1.5em", 10.0), Some(15.0));
    }
}
