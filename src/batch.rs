//! Batch conversion – routes each input by kind, isolates failures per
//! document, and assembles the selected outputs into the final PDF.

use std::collections::HashMap;
use std::fs;

use serde::Serialize;

use crate::attempt::Renderer;
use crate::error::ConvertError;
use crate::ladder::Tier;
use crate::merge::merge_pdfs;
use crate::pipeline::{generate_pdf, PipelineConfig};
use crate::source::{decode_text, image_to_html, DocumentKind, SourceDocument};

/// Turns a non-HTML office document into HTML for the ladder.
pub trait HtmlConverter {
    fn to_html(&self, doc: &SourceDocument) -> Result<String, ConvertError>;
}

/// PDF produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub bytes: Vec<u8>,
    /// Tier that rendered it; `None` for PDFs passed through untouched.
    pub tier: Option<Tier>,
}

/// Converts documents with one renderer and configuration.
pub struct Converter {
    config: PipelineConfig,
    renderer: Box<dyn Renderer>,
    converters: HashMap<DocumentKind, Box<dyn HtmlConverter>>,
}

impl Converter {
    pub fn new(config: PipelineConfig, renderer: impl Renderer + 'static) -> Self {
        Self {
            config,
            renderer: Box::new(renderer),
            converters: HashMap::new(),
        }
    }

    /// Register an HTML converter for spreadsheets or word-processing files.
    pub fn with_converter(
        mut self,
        kind: DocumentKind,
        converter: impl HtmlConverter + 'static,
    ) -> Self {
        self.converters.insert(kind, Box::new(converter));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert one document to PDF.
    pub fn convert_document(&self, doc: &SourceDocument) -> Result<Converted, ConvertError> {
        let kind = doc.kind()?;
        let html = match kind {
            DocumentKind::Pdf => {
                log::debug!("{}: PDF passed through", doc.name);
                return Ok(Converted {
                    bytes: doc.bytes.clone(),
                    tier: None,
                });
            }
            DocumentKind::Html => decode_text(&doc.bytes),
            DocumentKind::Image => image_to_html(&doc.name, &doc.bytes),
            DocumentKind::Spreadsheet | DocumentKind::WordProcessing => {
                match self.converters.get(&kind) {
                    Some(converter) => converter.to_html(doc)?,
                    None => {
                        return Err(ConvertError::UnsupportedFormat(format!(
                            "no converter registered for `{}`",
                            doc.name
                        )))
                    }
                }
            }
        };

        // Relative resources resolve against a private directory holding
        // the source file; it is removed when `workdir` drops.
        let workdir = tempfile::Builder::new().prefix("pdf-unify-").tempdir()?;
        if kind == DocumentKind::Html {
            fs::write(workdir.path().join(doc.file_name()), &doc.bytes)?;
        }
        let rendered = generate_pdf(&html, &self.config, self.renderer.as_ref(), workdir.path())?;
        Ok(Converted {
            bytes: rendered.bytes,
            tier: Some(rendered.tier),
        })
    }

    /// Convert every document; one failure never stops the others.
    pub fn convert_batch(&self, docs: &[SourceDocument]) -> BatchReport {
        let outcomes: Vec<DocumentOutcome> = docs
            .iter()
            .map(|doc| {
                let result = self.convert_document(doc);
                match &result {
                    Ok(c) => log::info!(
                        "{}: converted ({})",
                        doc.name,
                        c.tier.map_or("passthrough", Tier::label)
                    ),
                    Err(e) => log::warn!("{}: {e}", doc.name),
                }
                DocumentOutcome {
                    name: doc.name.clone(),
                    result,
                }
            })
            .collect();
        let report = BatchReport { outcomes };
        log::info!(
            "batch finished: {} converted, {} failed",
            report.successes().count(),
            report.failures().count()
        );
        report
    }
}

/// Result of converting one input document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub name: String,
    pub result: Result<Converted, ConvertError>,
}

/// Whether and where a converted document goes into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub include: bool,
    pub order: u32,
}

#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = (&str, &Converted)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|c| (o.name.as_str(), c)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ConvertError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    /// Every success included, in input order (`order` = 1, 2, …).
    pub fn default_selection(&self) -> Vec<Selection> {
        (1..)
            .zip(self.successes())
            .map(|(order, _)| Selection {
                include: true,
                order,
            })
            .collect()
    }

    /// Successful documents picked by `selections` (one per success, in
    /// success order), sorted by `order` with ties kept in input order.
    pub fn ordered(&self, selections: &[Selection]) -> Vec<(&str, &Converted)> {
        let mut picked: Vec<(u32, (&str, &Converted))> = self
            .successes()
            .zip(selections)
            .filter(|(_, sel)| sel.include)
            .map(|(doc, sel)| (sel.order, doc))
            .collect();
        picked.sort_by_key(|(order, _)| *order);
        picked.into_iter().map(|(_, doc)| doc).collect()
    }

    /// One output PDF: the single selected document unchanged, or the
    /// selected documents merged in order.
    pub fn assemble(&self, selections: &[Selection]) -> Result<Vec<u8>, ConvertError> {
        let ordered = self.ordered(selections);
        let pdfs: Vec<&[u8]> = ordered.iter().map(|(_, c)| c.bytes.as_slice()).collect();
        merge_pdfs(&pdfs)
    }

    /// Per-document summary for serialization.
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(c) => ReportEntry {
                    name: o.name.clone(),
                    status: Status::Converted,
                    tier: c.tier.map(|t| t.label().to_string()),
                    bytes: c.bytes.len(),
                    error: None,
                },
                Err(e) => ReportEntry {
                    name: o.name.clone(),
                    status: Status::Failed,
                    tier: e.tier_label().map(str::to_string),
                    bytes: 0,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, ConvertError> {
        Ok(serde_json::to_string_pretty(&self.entries())?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Converted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: Status,
    /// Tier that succeeded, or the last tier tried on a render failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::error::RenderFailure;

    fn fake_pdf(tag: &str) -> Vec<u8> {
        format!("%PDF-{tag}").into_bytes()
    }

    fn accept_all(html: &str, _: &Path) -> Result<Vec<u8>, RenderFailure> {
        if html.contains("FAIL") {
            Err(RenderFailure::error("renderer refused"))
        } else {
            Ok(fake_pdf("ok"))
        }
    }

    fn converter() -> Converter {
        Converter::new(PipelineConfig::default(), accept_all)
    }

    struct UpperCaseSheet;

    impl HtmlConverter for UpperCaseSheet {
        fn to_html(&self, doc: &SourceDocument) -> Result<String, ConvertError> {
            Ok(format!("<table><tr><td>{}</td></tr></table>", doc.name.to_uppercase()))
        }
    }

    #[test]
    fn pdf_passes_through() {
        let doc = SourceDocument::new("a.pdf", fake_pdf("orig"));
        let out = converter().convert_document(&doc).unwrap();
        assert_eq!(out.bytes, fake_pdf("orig"));
        assert_eq!(out.tier, None);
    }

    #[test]
    fn failures_are_isolated() {
        let docs = vec![
            SourceDocument::new("good.html", "<p>ok</p>"),
            SourceDocument::new("bad.html", "<p>FAIL</p>"),
            SourceDocument::new("notes.txt", "plain"),
            SourceDocument::new("sheet.xlsx", Vec::new()),
            SourceDocument::new("z.pdf", fake_pdf("z")),
        ];
        let report = converter().convert_batch(&docs);
        let ok: Vec<_> = report.successes().map(|(n, _)| n).collect();
        assert_eq!(ok, ["good.html", "z.pdf"]);
        let failed: Vec<_> = report.failures().map(|(n, _)| n).collect();
        assert_eq!(failed, ["bad.html", "notes.txt", "sheet.xlsx"]);
        let bad = report.failures().next().unwrap().1;
        assert_eq!(bad.tier_label(), Some("basic mode"));
    }

    #[test]
    fn registered_converter_is_used() {
        let conv = converter().with_converter(DocumentKind::Spreadsheet, UpperCaseSheet);
        let out = conv
            .convert_document(&SourceDocument::new("sheet.xlsx", Vec::new()))
            .unwrap();
        assert_eq!(out.tier, Some(Tier::Current));
        assert!(matches!(
            conv.convert_document(&SourceDocument::new("letter.docx", Vec::new())),
            Err(ConvertError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn selection_orders_with_stable_ties() {
        let docs = vec![
            SourceDocument::new("a.pdf", fake_pdf("a")),
            SourceDocument::new("b.pdf", fake_pdf("b")),
            SourceDocument::new("c.pdf", fake_pdf("c")),
        ];
        let report = converter().convert_batch(&docs);
        let sel = [
            Selection { include: true, order: 2 },
            Selection { include: false, order: 1 },
            Selection { include: true, order: 2 },
        ];
        let names: Vec<_> = report.ordered(&sel).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a.pdf", "c.pdf"]);
    }

    #[test]
    fn single_selection_returned_unchanged() {
        let docs = vec![
            SourceDocument::new("a.pdf", fake_pdf("a")),
            SourceDocument::new("b.pdf", fake_pdf("b")),
        ];
        let report = converter().convert_batch(&docs);
        let sel = [
            Selection { include: false, order: 1 },
            Selection { include: true, order: 2 },
        ];
        assert_eq!(report.assemble(&sel).unwrap(), fake_pdf("b"));
        let none = [Selection { include: false, order: 1 }; 2];
        assert!(matches!(report.assemble(&none), Err(ConvertError::NothingSelected)));
    }

    #[test]
    fn report_json_names_tiers_and_errors() {
        let docs = vec![
            SourceDocument::new("good.html", "<p>ok</p>"),
            SourceDocument::new("bad.html", "<p>FAIL</p>"),
        ];
        let json = converter().convert_batch(&docs).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["status"], "converted");
        assert_eq!(value[0]["tier"], "current");
        assert_eq!(value[1]["status"], "failed");
        assert_eq!(value[1]["tier"], "basic mode");
        assert!(value[1]["error"].as_str().unwrap().contains("renderer refused"));
    }
}
