//! External renderer – runs an HTML → PDF program through
//! [`std::process::Command`].
//!
//! Arguments may contain `{input}` and `{output}` placeholders, replaced by
//! the candidate HTML file and the expected PDF file. Both live in the
//! document's working directory, which is also the program's cwd so
//! relative resources resolve the way they did next to the source file.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::attempt::Renderer;
use crate::error::RenderFailure;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
const CANDIDATE_FILE: &str = "candidate.html";
const OUTPUT_FILE: &str = "candidate.pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    /// `args` without any placeholder get `{input} {output}` appended.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args: Vec<String> = args.into_iter().map(Into::into).collect();
        let has_placeholder = args
            .iter()
            .any(|a| a.contains(INPUT_PLACEHOLDER) || a.contains(OUTPUT_PLACEHOLDER));
        if !has_placeholder {
            args.push(INPUT_PLACEHOLDER.to_string());
            args.push(OUTPUT_PLACEHOLDER.to_string());
        }
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a shell-like command line (`"weasyprint {input} {output}"`).
    /// Single and double quotes group words; there is no escaping.
    pub fn from_command_line(line: &str) -> Result<Self, String> {
        let mut words = split_command_line(line)?.into_iter();
        let program = words
            .next()
            .ok_or_else(|| "renderer command is empty".to_string())?;
        Ok(Self::new(program, words))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, html: &str, base_path: &Path) -> Result<Vec<u8>, RenderFailure> {
        let input = base_path.join(CANDIDATE_FILE);
        let output = base_path.join(OUTPUT_FILE);
        fs::write(&input, html)
            .map_err(|e| RenderFailure::error(format!("cannot write candidate HTML: {e}")))?;
        if output.exists() {
            fs::remove_file(&output).map_err(|e| {
                RenderFailure::error(format!("cannot clear previous output: {e}"))
            })?;
        }

        let input_arg = input.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, &input_arg)
                    .replace(OUTPUT_PLACEHOLDER, &output_arg)
            })
            .collect();

        log::debug!("running {} {:?}", self.program, args);
        let result = Command::new(&self.program)
            .args(&args)
            .current_dir(base_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RenderFailure::error(format!("failed to start `{}`: {e}", self.program)))?;

        let log = format!(
            "{}{}",
            String::from_utf8_lossy(&result.stdout),
            String::from_utf8_lossy(&result.stderr)
        );
        if !result.status.success() {
            return Err(RenderFailure::new(
                log,
                Some(format!("`{}` exited with {}", self.program, result.status)),
            ));
        }

        match fs::read(&output) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(RenderFailure::new(
                log,
                Some(format!("`{}` wrote an empty PDF", self.program)),
            )),
            Err(e) => Err(RenderFailure::new(
                log,
                Some(format!("`{}` produced no output file: {e}", self.program)),
            )),
        }
    }
}

fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote in renderer command"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_parsing() {
        let r = CommandRenderer::from_command_line(r#"wkhtmltopdf --title "My Doc" {input} {output}"#)
            .unwrap();
        assert_eq!(r.program(), "wkhtmltopdf");
        assert_eq!(r.args, ["--title", "My Doc", "{input}", "{output}"]);

        let r = CommandRenderer::from_command_line("weasyprint").unwrap();
        assert_eq!(r.args, ["{input}", "{output}"]);

        assert!(CommandRenderer::from_command_line("   ").is_err());
        assert!(CommandRenderer::from_command_line("prog 'open").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn runs_program_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let r = CommandRenderer::new("sh", ["-c", "cp \"$0\" \"$1\"", "{input}", "{output}"]);
        let bytes = r.render("<p>hi</p>", dir.path()).unwrap();
        assert_eq!(bytes, b"<p>hi</p>");
    }

    #[cfg(unix)]
    #[test]
    fn failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let r = CommandRenderer::new("sh", ["-c", "echo 'bad css' >&2; exit 3", "{input}"]);
        let failure = r.render("<p>x</p>", dir.path()).unwrap_err();
        assert!(failure.log.contains("bad css"));
        assert!(failure.error.unwrap().contains("exited"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let r = CommandRenderer::new("true", ["{input}"]);
        let failure = r.render("<p>x</p>", dir.path()).unwrap_err();
        assert!(failure.error.unwrap().contains("no output file"));
    }

    #[test]
    fn unknown_program() {
        let dir = tempfile::tempdir().unwrap();
        let r = CommandRenderer::new("pdf-unify-no-such-renderer", Vec::<String>::new());
        let failure = r.render("<p>x</p>", dir.path()).unwrap_err();
        assert!(failure.error.unwrap().contains("failed to start"));
    }
}
