//! Layout config – the frozen, per-page description handed from layout to
//! PDF rendering. Coordinates are points from the page's top-left corner.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// RGB colour, components in `0.0..=1.0`.
pub type Rgb = [f32; 3];

pub const BLACK: Rgb = [0.0, 0.0, 0.0];

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
    /// Decoded image bytes keyed by the `src` that referenced them.
    #[serde(skip)]
    pub images: BTreeMap<String, Vec<u8>>,
}

impl DocumentLayout {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
            images: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// One page of content, painted in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub boxes: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: BoxContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoxContent {
    /// Solid rectangle.
    Fill { color: Rgb },
    /// Rectangle outline.
    Border { color: Rgb, width: f32 },
    /// Horizontal rule along the top edge.
    Rule { color: Rgb, width: f32 },
    Text(TextContent),
    Image { src: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines.
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub line_height: f32,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub underline: bool,
    pub color: Rgb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the box (alignment).
    pub x_offset: f32,
    /// Y offset of the line top within the box.
    pub y_offset: f32,
    /// Estimated rendered width.
    pub width: f32,
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, content: BoxContent) -> Self {
        Self {
            x,
            y,
            width,
            height,
            content,
        }
    }

    pub fn text(&self) -> Option<&TextContent> {
        match &self.content {
            BoxContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl PageLayout {
    /// All text on the page, one line per entry.
    pub fn text_lines(&self) -> Vec<&str> {
        self.boxes
            .iter()
            .filter_map(LayoutBox::text)
            .flat_map(|t| t.lines.iter().map(|l| l.text.as_str()))
            .collect()
    }
}
