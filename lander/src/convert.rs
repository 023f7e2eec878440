//! Utility for converting markup snippets (titles, abstracts, author names) between formats.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    // Unwrap content that is a single paragraph, so `Title` does not become `<p>Title</p>`
    pub deparagraph: bool,
    // Mark up math for MathJax
    pub mathjax: bool,
}

impl ConvertOptions {
    pub const DEPARAGRAPH: Self = Self {
        deparagraph: true,
        mathjax: false,
    };
}

/// A converter between markup formats. Format names follow Pandoc, like `latex`, `html5`, and `plain`.
pub trait MarkupConverter {
    /// Converts `content` from one format to another.
    ///
    /// # Errors
    /// This function returns an error if the conversion fails.
    fn convert(&self, content: &str, from: &str, to: &str, options: ConvertOptions)
        -> Result<String>;

    /// Converts `content`, falling back to the unconverted content if conversion fails.
    fn convert_or_raw(&self, content: &str, from: &str, to: &str, options: ConvertOptions) -> String {
        self.convert(content, from, to, options)
            .unwrap_or_else(|error| {
                warn!("Using unconverted {from} text: {error:#}");
                content.to_owned()
            })
    }
}

/// Converts markup by running the `pandoc` executable.
pub struct PandocConverter {
    executable: PathBuf,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl PandocConverter {
    /// Creates a converter that runs the given executable, either a path or a name to look up in `PATH`.
    #[must_use]
    pub fn new(executable: impl AsRef<Path>) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }

    fn run(&self, args: &[&str], input: &str) -> Result<String> {
        debug!("Running {:?} with arguments {args:?}", self.executable);

        let mut child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start {:?}", self.executable))?;

        // Pandoc reads all of its input before writing output
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .context("failed to write input to converter")?;
        }

        let output = child
            .wait_with_output()
            .context("failed to wait for converter to finish")?;
        if !output.status.success() {
            bail!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).context("converter output is not valid UTF-8")
    }
}

impl MarkupConverter for PandocConverter {
    fn convert(
        &self,
        content: &str,
        from: &str,
        to: &str,
        options: ConvertOptions,
    ) -> Result<String> {
        let mut args = vec!["--wrap=none"];
        if options.mathjax {
            args.push("--mathjax");
        }

        let output = if options.deparagraph {
            // Round trip through Pandoc's JSON AST to unwrap a lone paragraph
            let json = self
                .run(&["-f", from, "-t", "json"], content)
                .context("failed to convert content to Pandoc JSON")?;
            let mut ast: Value =
                serde_json::from_str(&json).context("failed to parse Pandoc JSON")?;
            deparagraph(&mut ast);

            args.extend(["-f", "json", "-t", to]);
            self.run(&args, &ast.to_string())
                .with_context(|| format!("failed to convert Pandoc JSON to {to}"))?
        } else {
            args.extend(["-f", from, "-t", to]);
            self.run(&args, content)
                .with_context(|| format!("failed to convert {from} to {to}"))?
        };

        Ok(output.trim_end().to_owned())
    }
}

/// Turns a document that is a single paragraph into plain inline content.
/// Documents with any other shape are left alone.
pub fn deparagraph(ast: &mut Value) {
    if let Some([block]) = ast
        .get_mut("blocks")
        .and_then(Value::as_array_mut)
        .map(Vec::as_mut_slice)
    {
        if block.get("t").and_then(Value::as_str) == Some("Para") {
            block["t"] = Value::from("Plain");
        }
    }
}

#[cfg(test)]
mod test {
    use super::{deparagraph, ConvertOptions, MarkupConverter, PandocConverter};
    use serde_json::{json, Value};

    fn document(blocks: Value) -> Value {
        json!({
            "pandoc-api-version": [1, 23],
            "meta": {},
            "blocks": blocks,
        })
    }

    #[test]
    fn single_paragraph() {
        let mut ast = document(json!([
            {"t": "Para", "c": [{"t": "Str", "c": "Title"}]}
        ]));
        deparagraph(&mut ast);

        assert_eq!(
            ast["blocks"],
            json!([{"t": "Plain", "c": [{"t": "Str", "c": "Title"}]}])
        );
    }

    #[test]
    fn multiple_blocks() {
        let blocks = json!([
            {"t": "Para", "c": [{"t": "Str", "c": "One"}]},
            {"t": "Para", "c": [{"t": "Str", "c": "Two"}]}
        ]);
        let mut ast = document(blocks.clone());
        deparagraph(&mut ast);
        assert_eq!(ast["blocks"], blocks);

        let list = json!([{"t": "BulletList", "c": []}]);
        let mut ast = document(list.clone());
        deparagraph(&mut ast);
        assert_eq!(ast["blocks"], list);
    }

    #[test]
    fn missing_executable_falls_back() {
        let converter = PandocConverter::new("/nonexistent/pandoc");
        assert!(converter
            .convert("Title", "latex", "html5", ConvertOptions::default())
            .is_err());
        assert_eq!(
            converter.convert_or_raw(r"\emph{Title}", "latex", "html5", ConvertOptions::DEPARAGRAPH),
            r"\emph{Title}"
        );
    }
}
