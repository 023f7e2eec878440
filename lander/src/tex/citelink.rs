//! Code for replacing citation commands with `\href` links,
//! so that TeX snippets like abstracts can be converted without a BibTeX run.

use super::command::{ArgumentSlot, Bracket, LatexCommand, ParsedCommand};
use crate::bib::BibDatabase;
use std::sync::LazyLock;
use tracing::warn;

static CITEDS: LazyLock<LatexCommand> = LazyLock::new(|| cite_document_command("citeds"));
static CITEDSP: LazyLock<LatexCommand> = LazyLock::new(|| cite_document_command("citedsp"));

static CITEP: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "citep",
        [
            ArgumentSlot::optional(Bracket::Square).named("prenote"),
            ArgumentSlot::optional(Bracket::Square).named("postnote"),
            ArgumentSlot::required(Bracket::Curly).named("keys"),
        ],
    )
});

fn cite_document_command(name: &str) -> LatexCommand {
    LatexCommand::new(
        name,
        [
            ArgumentSlot::optional(Bracket::Square).named("title"),
            ArgumentSlot::required(Bracket::Curly).named("key"),
        ],
    )
}

/// Replaces `\citeds`, `\citedsp`, and `\citep` citations with `\href` commands.
pub struct CitationLinker<'b> {
    bib: &'b BibDatabase,
}

impl<'b> CitationLinker<'b> {
    #[must_use]
    pub fn new(bib: &'b BibDatabase) -> Self {
        Self { bib }
    }

    /// Links every supported citation in `source`.
    ///
    /// - `\citeds[title]{LDM-151}` becomes `\href{https://ls.st/LDM-151}{title}`,
    ///   with the key as the link text if there is no title
    /// - `\citedsp` is the same, wrapped in square brackets
    /// - `\citep{k1,k2}` becomes a bracketed list with one author-year link per key,
    ///   falling back to plain author-year text, a link labeled with the key, or the bare key
    #[must_use]
    pub fn link(&self, source: &str) -> String {
        let source = replace_commands(source, &CITEDS, |parsed| link_document(parsed, false));
        let source = replace_commands(&source, &CITEDSP, |parsed| link_document(parsed, true));
        replace_commands(&source, &CITEP, |parsed| self.link_citep(parsed))
    }

    fn link_citep(&self, parsed: &ParsedCommand<'_>) -> Option<String> {
        let links: Vec<String> = parsed
            .get("keys")?
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| self.link_key(key))
            .collect();

        // With a single optional argument, natbib treats it as the postnote
        let (prenote, postnote) = match (parsed.get("prenote"), parsed.get("postnote")) {
            (Some(postnote), None) => (None, Some(postnote)),
            notes => notes,
        };

        let mut content = String::from("[");
        if let Some(prenote) = prenote.filter(|note| !note.is_empty()) {
            content.push_str(prenote);
            content.push(' ');
        }
        content.push_str(&links.join(", "));
        if let Some(postnote) = postnote.filter(|note| !note.is_empty()) {
            content.push_str(", ");
            content.push_str(postnote);
        }
        content.push(']');

        Some(content)
    }

    fn link_key(&self, key: &str) -> String {
        let Some(entry) = self.bib.get(key) else {
            return key.to_owned();
        };

        match (entry.url(), entry.author_year()) {
            (Some(url), Some(author_year)) => href(&url, &author_year),
            (None, Some(author_year)) => author_year,
            (Some(url), None) => href(&url, key),
            (None, None) => key.to_owned(),
        }
    }
}

fn link_document(parsed: &ParsedCommand<'_>, bracketed: bool) -> Option<String> {
    let key = parsed.get("key")?;
    let text = parsed.get("title").unwrap_or(key);
    let link = href(&format!("https://ls.st/{key}"), text);

    Some(if bracketed { format!("[{link}]") } else { link })
}

fn href(url: &str, text: &str) -> String {
    format!(r"\href{{{url}}}{{{text}}}")
}

/// Replaces each invocation of `command` with the output of `replace`.
/// Invocations for which `replace` returns `None` are kept as they are.
/// A malformed invocation stops the replacement of this command; the rest of the source is kept.
fn replace_commands<F>(source: &str, command: &LatexCommand, replace: F) -> String
where
    F: Fn(&ParsedCommand<'_>) -> Option<String>,
{
    let mut output = String::with_capacity(source.len());
    let mut last_end = 0;

    for parsed in command.parse(source) {
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!("Stopped linking citations: {error}");
                break;
            }
        };
        // Nested inside an invocation that was already replaced
        if parsed.start < last_end {
            continue;
        }

        if let Some(replacement) = replace(&parsed) {
            output.push_str(&source[last_end..parsed.start]);
            output.push_str(&replacement);
            last_end = parsed.start + parsed.source.len();
        }
    }
    output.push_str(&source[last_end..]);

    output
}
