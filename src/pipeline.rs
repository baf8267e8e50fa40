//! Pipeline – configuration plus the per-document flow: first candidate →
//! degradation ladder → render attempts.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attempt::{render_candidates, Renderer, Rendered};
use crate::error::ConvertError;
use crate::ladder::{degrade, first_candidate};
use crate::render::NativeRenderer;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

impl PageOrientation {
    pub fn css_name(self) -> &'static str {
        match self {
            PageOrientation::Portrait => "portrait",
            PageOrientation::Landscape => "landscape",
        }
    }
}

/// Paper size named in the page CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Portrait width and height in points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "Letter",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unknown page size `{other}` (expected A4 or Letter)")),
        }
    }
}

/// Configuration for the conversion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata (default: "pdf-unify output").
    pub title: String,
    /// Left and right page margin in millimetres; clamped on use.
    pub margin_mm: u32,
    /// When false, the page CSS also pins the paper size and orientation.
    pub preserve_layout: bool,
    pub page_size: PageSize,
    pub orientation: PageOrientation,
    /// Whether the first candidate is fully sanitized.
    pub sanitize: bool,
    /// Merge every selected output into one PDF.
    pub combine: bool,
    /// File name of the merged PDF.
    pub output_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "pdf-unify output".to_string(),
            margin_mm: 10,
            preserve_layout: true,
            page_size: PageSize::A4,
            orientation: PageOrientation::Portrait,
            sanitize: true,
            combine: true,
            output_name: "merged.pdf".to_string(),
        }
    }
}

impl PipelineConfig {
    pub const MIN_MARGIN_MM: u32 = 5;
    pub const MAX_MARGIN_MM: u32 = 25;

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConvertError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConvertError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Margin after clamping to the supported range.
    pub fn margin_mm(&self) -> u32 {
        self.margin_mm
            .clamp(Self::MIN_MARGIN_MM, Self::MAX_MARGIN_MM)
    }

    pub fn margin_pt(&self) -> f32 {
        self.margin_mm() as f32 * 72.0 / 25.4
    }

    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            PageOrientation::Portrait => w,
            PageOrientation::Landscape => h,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            PageOrientation::Portrait => h,
            PageOrientation::Landscape => w,
        }
    }

    /// The `@page` rule injected into every candidate.
    pub fn page_css(&self) -> String {
        let m = self.margin_mm();
        if self.preserve_layout {
            format!("@page {{ margin-left: {m}mm; margin-right: {m}mm; }}")
        } else {
            format!(
                "@page {{ size: {} {}; margin-left: {m}mm; margin-right: {m}mm; }}",
                self.page_size.css_name(),
                self.orientation.css_name()
            )
        }
    }

    /// Output file name with a `.pdf` extension.
    pub fn output_file_name(&self) -> String {
        let name = self.output_name.trim();
        let name = if name.is_empty() { "merged.pdf" } else { name };
        if name.to_ascii_lowercase().ends_with(".pdf") {
            name.to_string()
        } else {
            format!("{name}.pdf")
        }
    }

    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }
}

/// Full pipeline for one HTML document: build the first candidate, degrade
/// it into the ladder and hand the tiers to `renderer` in order.
///
/// `base_path` is the directory relative resources resolve against.
pub fn generate_pdf(
    html: &str,
    config: &PipelineConfig,
    renderer: &dyn Renderer,
    base_path: &Path,
) -> Result<Rendered, ConvertError> {
    let page_css = config.page_css();
    let first = first_candidate(html, &page_css, config.sanitize);
    let ladder = degrade(&first, &page_css);
    render_candidates(ladder.attempts(), renderer, base_path)
}

/// Convenience: render with the in-crate renderer and default A4 config.
pub fn generate_pdf_from_html(html: &str) -> Result<Vec<u8>, ConvertError> {
    let config = PipelineConfig::default();
    let renderer = NativeRenderer::new(&config);
    let workdir = tempfile::tempdir()?;
    let rendered = generate_pdf(html, &config, &renderer, workdir.path())?;
    Ok(rendered.bytes)
}
