//! Integration tests for the pdf-unify pipeline.
//!
//! These tests validate:
//! - The CSS filter and HTML rewriter on realistic documents
//! - The degradation ladder against stub and built-in renderers
//! - Batch conversion, selection and merging
//! - Configuration files and output stability

use std::io::Cursor;
use std::path::Path;

use pdf_unify::attempt::{attempt_render, render_candidates, Renderer};
use pdf_unify::batch::{Converter, Selection};
use pdf_unify::css::sanitize_css;
use pdf_unify::dom::{parse_html, stylesheets};
use pdf_unify::error::{ConvertError, RenderFailure};
use pdf_unify::html::sanitize_html;
use pdf_unify::ladder::{degrade, first_candidate, Tier};
use pdf_unify::layout::{layout_html, PageGeometry};
use pdf_unify::merge::{merge_pdfs, page_count};
use pdf_unify::pipeline::{generate_pdf, PageSize, PipelineConfig};
use pdf_unify::render::{unsupported_constructs, NativeRenderer};
use pdf_unify::source::SourceDocument;
use pdf_unify::templates;
use sha2::{Digest, Sha256};

// =====================================================================
// Helper
// =====================================================================

fn default_config() -> PipelineConfig {
    PipelineConfig::default()
}

fn page_css() -> String {
    default_config().page_css()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn sha256(text: &str) -> Vec<u8> {
    Sha256::digest(text.as_bytes()).to_vec()
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

// =====================================================================
// CSS filter
// =====================================================================

#[test]
fn nested_media_block_removed_with_context_intact() {
    let css = "h1 { color: blue; } @media print { .a { color: red; } } p { margin: 0; }";
    assert_eq!(sanitize_css(css), "h1 { color: blue; }  p { margin: 0; }");
}

#[test]
fn filter_output_is_stable_on_second_pass() {
    for (name, html) in templates::all() {
        let css = stylesheets(&parse_html(html)).join("\n");
        let once = sanitize_css(&css);
        let twice = sanitize_css(&once);
        for needle in ["@media", ":hover", "display:flex", "display: flex"] {
            assert!(!twice.contains(needle), "{name}: `{needle}` survived");
        }
        assert_eq!(once, twice, "{name}: second pass changed the output");
    }
}

#[test]
fn combinators_become_descendant_selectors() {
    assert_eq!(
        sanitize_css(".a > .b ~ .c + .d { color:red; }"),
        ".a   .b   .c   .d { color:red; }"
    );
}

#[test]
fn layout_functions_are_neutralized() {
    let out = sanitize_css(".a { width: calc(100% - 20px); color: var(--main-color); }");
    assert_eq!(out, ".a { width: 1; color: ; }");
}

// =====================================================================
// HTML rewriter
// =====================================================================

#[test]
fn inline_positioning_is_dropped() {
    let html = r#"<html><head></head><body><div style="color:red; position:fixed; top:0;">x</div></body></html>"#;
    let out = sanitize_html(html, &page_css());
    assert!(out.contains(r#"style="color:red""#), "{out}");
}

#[test]
fn fragment_gets_synthesized_head() {
    let out = sanitize_html(templates::headless_fragment(), &page_css());
    let head_end = out.find("</head>").expect("synthesized head");
    let head = &out[..head_end];
    assert!(head.contains("<meta charset"));
    assert!(head.contains(&page_css()));
    assert!(out.contains("Quarterly notes"));
}

#[test]
fn rewriting_is_idempotent() {
    for (name, html) in templates::all() {
        let once = sanitize_html(html, &page_css());
        assert_eq!(sanitize_html(&once, &page_css()), once, "{name}");
        assert_eq!(once.matches(&page_css()).count(), 1, "{name}");
    }
}

// =====================================================================
// Degradation ladder with stub renderers
// =====================================================================

#[test]
fn stub_accepting_only_basic_mode() {
    let first = first_candidate(templates::modern_landing_page(), &page_css(), true);
    let ladder = degrade(&first, &page_css());
    let mut tried = Vec::new();
    let rendered = attempt_render(ladder.attempts(), |attempt| {
        tried.push(attempt.tier);
        match attempt.tier {
            Tier::BasicMode => Ok(b"%PDF-basic".to_vec()),
            _ => Err(RenderFailure::error(format!("refused {}", attempt.label()))),
        }
    })
    .unwrap();
    assert_eq!(tried, Tier::ALL);
    assert_eq!(rendered.bytes, b"%PDF-basic");
    assert_eq!(rendered.label(), "basic mode");
}

#[test]
fn stub_rejecting_everything_reports_last_tier() {
    let ladder = degrade(templates::invoice(), &page_css());
    let err = attempt_render(ladder.attempts(), |attempt| {
        Err(RenderFailure::new(
            format!("log of {}", attempt.label()),
            Some(format!("error in {}", attempt.label())),
        ))
    })
    .unwrap_err();
    match err {
        ConvertError::RenderExhausted { label, diagnostic } => {
            assert_eq!(label, "basic mode");
            assert_eq!(diagnostic.log, "log of basic mode");
            assert_eq!(diagnostic.error.as_deref(), Some("error in basic mode"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn ladder_is_deterministic() {
    let build = |html: &str| {
        let first = first_candidate(html, &page_css(), true);
        degrade(&first, &page_css())
            .iter()
            .map(|attempt| sha256(&attempt.html))
            .collect::<Vec<_>>()
    };
    for (name, html) in templates::all() {
        assert_eq!(build(html), build(html), "{name}");
    }
}

#[test]
fn basic_mode_carries_no_author_css() {
    let ladder = degrade(templates::modern_landing_page(), &page_css());
    let basic = &ladder.get(Tier::BasicMode).html;
    assert!(!basic.contains("--accent"));
    assert!(!basic.contains("display: flex"));
    assert!(basic.contains("Ship documents that print"));
    assert!(unsupported_constructs(&parse_html(basic)).is_empty());
}

// =====================================================================
// Built-in renderer driving the ladder
// =====================================================================

#[test]
fn modern_page_degrades_past_first_tier() {
    let config = default_config();
    let dir = tempfile::tempdir().unwrap();
    let renderer = NativeRenderer::new(&config);
    let rendered = generate_pdf(
        templates::modern_landing_page(),
        &config,
        &renderer,
        dir.path(),
    )
    .unwrap();
    assert_ne!(rendered.tier, Tier::Current);
    assert_valid_pdf(&rendered.bytes);
}

#[test]
fn plain_documents_render_on_first_tier() {
    let config = default_config();
    let dir = tempfile::tempdir().unwrap();
    let renderer = NativeRenderer::new(&config);
    for html in [templates::invoice(), templates::table_report()] {
        let rendered = generate_pdf(html, &config, &renderer, dir.path()).unwrap();
        assert_eq!(rendered.tier, Tier::Current);
        assert_valid_pdf(&rendered.bytes);
    }
}

#[test]
fn unquoted_inline_flex_still_renders() {
    let config = PipelineConfig {
        sanitize: false,
        ..default_config()
    };
    let html = "<html><head></head><body><div style=display:flex>x</div></body></html>";
    let dir = tempfile::tempdir().unwrap();
    let renderer = NativeRenderer::new(&config);

    let first = first_candidate(html, &config.page_css(), config.sanitize);
    let ladder = degrade(&first, &config.page_css());
    for attempt in ladder.iter().skip(1) {
        assert!(!attempt.html.contains("display:flex"), "{}", attempt.label());
    }
    let basic = renderer.render(&ladder.get(Tier::BasicMode).html, dir.path()).unwrap();
    assert_valid_pdf(&basic);

    let rendered = generate_pdf(html, &config, &renderer, dir.path()).unwrap();
    assert_eq!(rendered.tier, Tier::StrongSanitize);
}

#[test]
fn every_sample_renders() {
    let config = default_config();
    let dir = tempfile::tempdir().unwrap();
    let renderer = NativeRenderer::new(&config);
    for (name, html) in templates::all() {
        let rendered = generate_pdf(html, &config, &renderer, dir.path())
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_valid_pdf(&rendered.bytes);
    }
}

#[test]
fn report_layout_keeps_text_and_fits_page() {
    let geometry = PageGeometry::default();
    let layout = layout_html(templates::table_report(), &geometry, "report", None);
    let text: Vec<&str> = layout.pages.iter().flat_map(|p| p.text_lines()).collect();
    assert!(text.iter().any(|l| l.contains("Monthly Report")));
    assert!(text.iter().any(|l| l.contains("North")));
    for page in &layout.pages {
        for b in &page.boxes {
            assert!(b.x >= 0.0 && b.x + b.width <= geometry.width + 0.5);
            assert!(b.y >= 0.0 && b.y <= geometry.height);
        }
    }
}

#[test]
fn layout_json_is_stable() {
    let geometry = PageGeometry::default();
    let a = layout_html(templates::invoice(), &geometry, "inv", None).to_json();
    let b = layout_html(templates::invoice(), &geometry, "inv", None).to_json();
    assert_eq!(sha256(&a), sha256(&b));
}

#[test]
fn relative_images_resolve_against_base_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("logo.png"), png_bytes()).unwrap();
    let config = default_config();
    let rendered = generate_pdf(
        r#"<p>Logo:</p><img src="logo.png">"#,
        &config,
        &NativeRenderer::new(&config),
        dir.path(),
    )
    .unwrap();
    assert_valid_pdf(&rendered.bytes);
}

// =====================================================================
// Batch conversion and merging
// =====================================================================

#[test]
fn batch_isolates_failures_and_merges_the_rest() {
    let config = default_config();
    let converter = Converter::new(config.clone(), NativeRenderer::new(&config));
    let docs = vec![
        SourceDocument::new("invoice.html", templates::invoice()),
        SourceDocument::new("notes.txt", "not convertible"),
        SourceDocument::new("photo.png", png_bytes()),
        SourceDocument::new("report.html", templates::table_report()),
    ];
    let report = converter.convert_batch(&docs);

    let failed: Vec<_> = report.failures().map(|(n, _)| n).collect();
    assert_eq!(failed, ["notes.txt"]);
    assert_eq!(report.successes().count(), 3);

    let expected_pages: usize = report
        .successes()
        .map(|(_, c)| page_count(&c.bytes).unwrap())
        .sum();
    let merged = report.assemble(&report.default_selection()).unwrap();
    assert_valid_pdf(&merged);
    assert_eq!(page_count(&merged).unwrap(), expected_pages);
}

#[test]
fn selection_reorders_and_excludes() {
    let config = default_config();
    let converter = Converter::new(config.clone(), NativeRenderer::new(&config));
    let docs = vec![
        SourceDocument::new("a.html", "<p>first</p>"),
        SourceDocument::new("b.html", "<p>second</p>"),
        SourceDocument::new("c.html", "<p>third</p>"),
    ];
    let report = converter.convert_batch(&docs);
    let sel = [
        Selection { include: true, order: 3 },
        Selection { include: false, order: 1 },
        Selection { include: true, order: 1 },
    ];
    let names: Vec<_> = report.ordered(&sel).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["c.html", "a.html"]);
    assert_eq!(page_count(&report.assemble(&sel).unwrap()).unwrap(), 2);
}

#[test]
fn merging_native_pdfs_adds_page_counts() {
    let config = default_config();
    let renderer = NativeRenderer::new(&config);
    let dir = tempfile::tempdir().unwrap();
    let one = generate_pdf("<p>one</p>", &config, &renderer, dir.path()).unwrap();
    let two = generate_pdf(templates::table_report(), &config, &renderer, dir.path()).unwrap();
    let merged = merge_pdfs(&[one.bytes.as_slice(), two.bytes.as_slice()]).unwrap();
    assert_eq!(
        page_count(&merged).unwrap(),
        page_count(&one.bytes).unwrap() + page_count(&two.bytes).unwrap()
    );
}

// =====================================================================
// Configuration
// =====================================================================

#[test]
fn config_file_fills_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, r#"{ "margin_mm": 3, "page_size": "letter", "title": "Q1" }"#).unwrap();
    let config = PipelineConfig::from_path(&path).unwrap();
    assert_eq!(config.page_size, PageSize::Letter);
    assert_eq!(config.margin_mm(), PipelineConfig::MIN_MARGIN_MM);
    assert_eq!(config.title, "Q1");
    assert!(config.sanitize);
    assert!(config.page_css().contains("margin-left: 5mm"));
}

#[test]
fn invalid_config_is_reported() {
    let err = PipelineConfig::from_json(r#"{ "page_size": "tabloid" }"#).unwrap_err();
    assert!(matches!(err, ConvertError::Config(_)));
}

#[test]
fn config_round_trips_through_json() {
    let config = PipelineConfig::a4_landscape();
    let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(back, config);
}

#[test]
fn render_candidates_uses_the_given_directory() {
    let dir = tempfile::tempdir().unwrap();
    let ladder = degrade("<p>x</p>", &page_css());
    let seen = std::cell::RefCell::new(None);
    let renderer = |_: &str, base: &Path| {
        *seen.borrow_mut() = Some(base.to_path_buf());
        Ok::<_, RenderFailure>(b"%PDF-x".to_vec())
    };
    render_candidates(ladder.attempts(), &renderer, dir.path()).unwrap();
    assert_eq!(seen.into_inner().as_deref(), Some(dir.path()));
}
