//! Render attempt sequencer.
//!
//! Feeds ladder candidates to a renderer strictly in order and stops at the
//! first one it accepts. Only the diagnostic of the most recent failure is
//! retained; earlier ones are logged and dropped.

use std::path::Path;

use crate::error::{ConvertError, RenderFailure};
use crate::ladder::{RenderAttempt, Tier};

/// An HTML → PDF engine.
///
/// `base_path` is the working directory relative resources (images,
/// stylesheets) are resolved against.
pub trait Renderer {
    fn render(&self, html: &str, base_path: &Path) -> Result<Vec<u8>, RenderFailure>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &Path) -> Result<Vec<u8>, RenderFailure>,
{
    fn render(&self, html: &str, base_path: &Path) -> Result<Vec<u8>, RenderFailure> {
        self(html, base_path)
    }
}

/// PDF bytes plus the tier that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub tier: Tier,
    pub bytes: Vec<u8>,
}

impl Rendered {
    pub fn label(&self) -> &'static str {
        self.tier.label()
    }
}

/// Try each candidate in order until `render` accepts one.
///
/// A renderer that "succeeds" with zero bytes counts as a rejection. When
/// every candidate is refused, the error carries the last tier's label and
/// diagnostic; an empty candidate list fails with label `none`.
pub fn attempt_render<F>(candidates: &[RenderAttempt], mut render: F) -> Result<Rendered, ConvertError>
where
    F: FnMut(&RenderAttempt) -> Result<Vec<u8>, RenderFailure>,
{
    let mut last: Option<(Tier, RenderFailure)> = None;

    for attempt in candidates {
        let failure = match render(attempt) {
            Ok(bytes) if !bytes.is_empty() => {
                if let Some((tier, diagnostic)) = &last {
                    log::debug!("discarding diagnostic of `{tier}`: {diagnostic}");
                }
                log::info!("rendered with `{}` ({} bytes)", attempt.label(), bytes.len());
                return Ok(Rendered {
                    tier: attempt.tier,
                    bytes,
                });
            }
            Ok(_) => RenderFailure::error("renderer produced an empty document"),
            Err(failure) => failure,
        };

        log::warn!(
            "{}",
            ConvertError::RenderRejected {
                label: attempt.label().to_string(),
                diagnostic: failure.clone(),
            }
        );
        last = Some((attempt.tier, failure));
    }

    let (label, diagnostic) = match last {
        Some((tier, diagnostic)) => (tier.label().to_string(), diagnostic),
        None => ("none".to_string(), RenderFailure::error("no render candidates")),
    };
    Err(ConvertError::RenderExhausted { label, diagnostic })
}

/// [`attempt_render`] driven by a [`Renderer`].
pub fn render_candidates(
    candidates: &[RenderAttempt],
    renderer: &dyn Renderer,
    base_path: &Path,
) -> Result<Rendered, ConvertError> {
    attempt_render(candidates, |attempt| renderer.render(&attempt.html, base_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::degrade;

    fn ladder() -> Vec<RenderAttempt> {
        degrade("<p>x</p>", "@page { margin-left: 10mm; margin-right: 10mm; }")
            .attempts()
            .to_vec()
    }

    #[test]
    fn first_success_wins() {
        let mut calls = 0;
        let out = attempt_render(&ladder(), |_| {
            calls += 1;
            Ok(b"%PDF".to_vec())
        })
        .unwrap();
        assert_eq!(out.tier, Tier::Current);
        assert_eq!(calls, 1);
    }

    #[test]
    fn falls_through_to_basic_mode() {
        let mut seen = Vec::new();
        let out = attempt_render(&ladder(), |a| {
            seen.push(a.tier);
            match a.tier {
                Tier::BasicMode => Ok(b"%PDF-basic".to_vec()),
                _ => Err(RenderFailure::error(format!("no {}", a.label()))),
            }
        })
        .unwrap();
        assert_eq!(out.label(), "basic mode");
        assert_eq!(out.bytes, b"%PDF-basic");
        assert_eq!(seen, Tier::ALL);
    }

    #[test]
    fn exhausted_keeps_only_last_diagnostic() {
        let err = attempt_render(&ladder(), |a| {
            Err(RenderFailure::log(format!("log of {}", a.label())))
        })
        .unwrap_err();
        match err {
            ConvertError::RenderExhausted { label, diagnostic } => {
                assert_eq!(label, "basic mode");
                assert_eq!(diagnostic.log, "log of basic mode");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_output_is_a_rejection() {
        let out = attempt_render(&ladder(), |a| match a.tier {
            Tier::Current => Ok(Vec::new()),
            _ => Ok(b"%PDF".to_vec()),
        })
        .unwrap();
        assert_eq!(out.tier, Tier::StrongSanitize);
    }

    #[test]
    fn no_candidates() {
        let err = attempt_render(&[], |_| Ok(b"%PDF".to_vec())).unwrap_err();
        assert_eq!(err.tier_label(), Some("none"));
    }

    #[test]
    fn closure_renderer() {
        let renderer = |html: &str, _: &Path| -> Result<Vec<u8>, RenderFailure> {
            if html.contains("table-layout: fixed") {
                Ok(b"%PDF".to_vec())
            } else {
                Err(RenderFailure::error("refused"))
            }
        };
        let candidates = ladder();
        let out = render_candidates(&candidates, &renderer, Path::new(".")).unwrap();
        assert_eq!(out.tier, Tier::BasicMode);
    }
}
