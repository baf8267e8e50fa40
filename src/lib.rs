//! # pdf-unify – normalize documents into one PDF for legacy renderers
//!
//! Modern HTML/CSS is reduced, tier by tier, until a CSS2.1-class renderer
//! accepts it. The stages are:
//!
//! 1. **Filter** – strip constructs legacy engines reject ([`css`], [`html`])
//! 2. **Degrade** – build the three-tier candidate ladder ([`ladder`])
//! 3. **Attempt** – try each tier against a [`Renderer`] ([`attempt`])
//! 4. **Collect** – convert a batch of sources and merge the selected
//!    outputs ([`source`], [`batch`], [`merge`])
//!
//! Two renderers ship with the crate: the in-crate legacy engine
//! ([`render::NativeRenderer`], built on [`dom`], [`layout`] and
//! [`layout_config`]) and an external-command adapter
//! ([`command::CommandRenderer`]).
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod attempt;
pub mod batch;
pub mod command;
pub mod css;
pub mod dom;
pub mod error;
pub mod ffi;
pub mod html;
pub mod ladder;
pub mod layout;
pub mod layout_config;
pub mod merge;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod templates;

// Re-exports for convenience
pub use attempt::{attempt_render, Rendered, Renderer};
pub use batch::{BatchReport, Converter, Selection};
pub use command::CommandRenderer;
pub use css::sanitize_css;
pub use error::{ConvertError, RenderFailure};
pub use html::sanitize_html;
pub use ladder::{degrade, Ladder, RenderAttempt, Tier};
pub use merge::merge_pdfs;
pub use pipeline::{generate_pdf, generate_pdf_from_html, PageOrientation, PageSize, PipelineConfig};
pub use render::NativeRenderer;
pub use source::SourceDocument;
