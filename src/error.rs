//! Error taxonomy for document conversion.
//!
//! The sanitizer itself never fails; everything here describes what can go
//! wrong around it: renderers refusing candidates, unsupported inputs, and the
//! I/O, image and PDF plumbing of a batch.

use std::fmt;

use thiserror::Error;

/// Diagnostic captured from one failed render attempt: the renderer's log
/// output and/or the error it raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderFailure {
    /// Log text emitted by the renderer while processing the candidate.
    pub log: String,
    /// Error message raised by the renderer, if any.
    pub error: Option<String>,
}

impl RenderFailure {
    pub fn new(log: impl Into<String>, error: Option<String>) -> Self {
        Self {
            log: log.into(),
            error,
        }
    }

    /// Failure carrying only an error message.
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            log: String::new(),
            error: Some(msg.into()),
        }
    }

    /// Failure carrying only log output.
    pub fn log(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            error: None,
        }
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.log.trim();
        match (&self.error, log.is_empty()) {
            (Some(e), true) => write!(f, "{e}"),
            (Some(e), false) => write!(f, "{e}\n{log}"),
            (None, false) => write!(f, "{log}"),
            (None, true) => write!(f, "renderer gave no diagnostic"),
        }
    }
}

/// Every way converting a document can fail.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Input that is not text at all (invalid UTF-8 or null pointers over the
    /// C ABI). The sanitizer accepts any string and never raises this.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// One degradation tier was refused by the renderer.
    #[error("renderer rejected `{label}`: {diagnostic}")]
    RenderRejected {
        label: String,
        diagnostic: RenderFailure,
    },

    /// Every tier was refused; carries the last tier's diagnostic.
    #[error("all render attempts failed; last attempt `{label}`: {diagnostic}")]
    RenderExhausted {
        label: String,
        diagnostic: RenderFailure,
    },

    /// The document kind is outside what this converter handles.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Nothing was left to assemble into an output PDF.
    #[error("no converted document selected for output")]
    NothingSelected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ConvertError {
    /// Label of the tier a render error refers to, if any.
    pub fn tier_label(&self) -> Option<&str> {
        match self {
            Self::RenderRejected { label, .. } | Self::RenderExhausted { label, .. } => {
                Some(label)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_combines_error_and_log() {
        let f = RenderFailure::new("line 3: bad css\n", Some("parse failed".into()));
        assert_eq!(f.to_string(), "parse failed\nline 3: bad css");
        assert_eq!(RenderFailure::default().to_string(), "renderer gave no diagnostic");
    }

    #[test]
    fn exhausted_message_names_tier() {
        let err = ConvertError::RenderExhausted {
            label: "basic mode".into(),
            diagnostic: RenderFailure::error("boom"),
        };
        assert_eq!(err.tier_label(), Some("basic mode"));
        assert!(err.to_string().contains("`basic mode`: boom"));
    }
}
