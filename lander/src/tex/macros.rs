//! Code for scraping argument-free macro definitions from TeX source and expanding them.

use super::command::{balanced_group, ArgumentSlot, Bracket, LatexCommand};
use aho_corasick::{AhoCorasick, MatchKind};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

// `\def\name{content}`, entirely on one line
static DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\def\s*(\\[a-zA-Z]*?)\s*\{(.*?)\}").expect("`\\def` pattern should be valid")
});

// `\newcommand\name`, without braces around the name
static UNBRACED_NEWCOMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\newcommand\s*(\\[a-zA-Z@]+)").expect("`\\newcommand` pattern should be valid")
});

static NEWCOMMAND: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "newcommand",
        [
            ArgumentSlot::required(Bracket::Curly).named("name"),
            ArgumentSlot::optional(Bracket::Square).named("arguments"),
            ArgumentSlot::required(Bracket::Curly).named("content"),
        ],
    )
});

/// Macro names (with their leading backslash) mapped to replacement text, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MacroTable(IndexMap<String, String>);

impl MacroTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a macro, replacing the content of an existing macro with the same name.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.0.insert(name.into(), content.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, C> FromIterator<(N, C)> for MacroTable
where
    N: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, content) in iter {
            table.insert(name, content);
        }
        table
    }
}

/// Collects the argument-free macros declared in TeX source.
///
/// Every `\def` declaration is collected first, then every `\newcommand` declaration,
/// so a `\newcommand` replaces a `\def` of the same name.
/// Within each style, later declarations replace earlier ones.
/// `\newcommand` declarations with an argument count are skipped.
#[must_use]
pub fn scrape_macros(source: &str) -> MacroTable {
    let mut macros = MacroTable::new();

    for captures in DEF.captures_iter(source) {
        macros.insert(&captures[1], &captures[2]);
    }

    for (name, content) in newcommand_macros(source) {
        macros.insert(name, content);
    }

    debug!("Scraped {} macros", macros.len());
    macros
}

fn newcommand_macros(source: &str) -> Vec<(&str, &str)> {
    let mut found = Vec::new();

    // `\newcommand{\name}{content}`
    for parsed in NEWCOMMAND.parse(source) {
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!("Skipping macro declaration: {error}");
                continue;
            }
        };

        // The name must be the first group after the command; other forms are handled below
        let braced = parsed.source["\\newcommand".len()..]
            .trim_start()
            .starts_with('{');
        if !braced || parsed.contains("arguments") {
            continue;
        }

        if let (Some(name), Some(content)) = (parsed.get("name"), parsed.get("content")) {
            if is_macro_name(name) {
                found.push((parsed.start, name, content));
            }
        }
    }

    // `\newcommand\name{content}`
    for captures in UNBRACED_NEWCOMMAND.captures_iter(source) {
        let invocation = captures.get(0).expect("whole match should always be present");
        let name = captures.get(1).expect("name group is not optional").as_str();

        let rest = &source[invocation.end()..];
        let open_at = invocation.end() + (rest.len() - rest.trim_start().len());
        if let Some(close_at) = balanced_group(source, open_at, Bracket::Curly) {
            found.push((invocation.start(), name, source[open_at + 1..close_at].trim()));
        }
    }

    found.sort_by_key(|&(start, ..)| start);
    found.into_iter().map(|(_, name, content)| (name, content)).collect()
}

fn is_macro_name(name: &str) -> bool {
    name.strip_prefix('\\').is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic() || c == '@')
    })
}

/// Replaces every occurrence of each macro name with its content, inserted verbatim.
///
/// A backslash directly after a macro name that is followed by whitespace (or ends the source)
/// is an escaped space and is removed along with the name.
/// At any position the longest matching name wins, and replaced text is not expanded again.
#[must_use]
pub fn expand_macros(source: &str, macros: &MacroTable) -> String {
    if macros.is_empty() {
        return source.to_owned();
    }

    let contents: Vec<&str> = macros.0.values().map(String::as_str).collect();
    let matcher = match AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(macros.0.keys())
    {
        Ok(matcher) => matcher,
        Err(error) => {
            warn!("Macros were not expanded: {error}");
            return source.to_owned();
        }
    };

    let mut output = String::with_capacity(source.len());
    let mut last_end = 0;

    for found in matcher.find_iter(source) {
        output.push_str(&source[last_end..found.start()]);
        output.push_str(contents[found.pattern().as_usize()]);
        last_end = found.end();

        let rest = &source[last_end..];
        if let Some(after) = rest.strip_prefix('\\') {
            if after.chars().next().is_none_or(char::is_whitespace) {
                last_end += 1;
            }
        }
    }
    output.push_str(&source[last_end..]);

    output
}

#[cfg(test)]
mod test {
    use super::{expand_macros, scrape_macros, MacroTable};
    use pretty_assertions::assert_eq;

    #[test]
    fn def_single_line() {
        let macros = scrape_macros(r"\def \name {content}");
        assert_eq!(macros, MacroTable::from_iter([(r"\name", "content")]));

        let macros = scrape_macros("\\def\\handle{LDM-151}\n\\def\\product{Data Management}");
        assert_eq!(macros.get(r"\handle"), Some("LDM-151"));
        assert_eq!(macros.get(r"\product"), Some("Data Management"));
    }

    #[test]
    fn def_does_not_span_lines() {
        assert!(scrape_macros("\\def\\name{con\ntent}").is_empty());
    }

    #[test]
    fn newcommand_whitespace_variants() {
        for source in [
            r"\newcommand{\name}{content}",
            r"\newcommand {\name} {content}",
            r"\newcommand{ \name }{content}",
            r"\newcommand\name{content}",
            r"\newcommand \name {content}",
        ] {
            assert_eq!(
                scrape_macros(source),
                MacroTable::from_iter([(r"\name", "content")]),
                "source: {source}"
            );
        }
    }

    #[test]
    fn newcommand_nested_and_multiline() {
        let macros = scrape_macros("\\newcommand{\\name}{\\textbf{bold}\n text}");
        assert_eq!(macros.get(r"\name"), Some("\\textbf{bold}\n text"));
    }

    #[test]
    fn newcommand_with_arguments_is_skipped() {
        let macros = scrape_macros(
            "\\newcommand{\\pu}[2]{#1 #2}\n\\newcommand\\ensure[1]{#1}\n\\newcommand{\\ok}{fine}",
        );
        assert_eq!(macros, MacroTable::from_iter([(r"\ok", "fine")]));
    }

    #[test]
    fn newcommand_overrides_def() {
        let macros = scrape_macros(
            "\\newcommand{\\name}{from newcommand}\n\\def\\name{from def}\n\\def\\other{x}",
        );
        assert_eq!(macros.get(r"\name"), Some("from newcommand"));
        assert_eq!(macros.get(r"\other"), Some("x"));
        assert_eq!(macros.len(), 2);
    }

    #[test]
    fn later_declarations_win() {
        let macros = scrape_macros("\\def\\a{1}\n\\def\\a{2}\n\\newcommand{\\b}{3}\n\\newcommand\\b{4}");
        assert_eq!(macros.get(r"\a"), Some("2"));
        assert_eq!(macros.get(r"\b"), Some("4"));
    }

    #[test]
    fn expand() {
        let macros = MacroTable::from_iter([(r"\handle", "LDM-nnn")]);
        let expanded = expand_macros(r"This is document \handle.", &macros);

        assert_eq!(expanded, "This is document LDM-nnn.");
        assert!(!expanded.contains(r"\handle"));
    }

    #[test]
    fn expand_escaped_space() {
        let macros = MacroTable::from_iter([(r"\product", "Data Management")]);
        assert_eq!(
            expand_macros(r"\title [Test Plan] { \product\ Test Plan}", &macros),
            r"\title [Test Plan] { Data Management Test Plan}"
        );
        assert_eq!(expand_macros(r"End \product\", &macros), "End Data Management");
        // A following command keeps its backslash
        assert_eq!(
            expand_macros(r"\product\emph{x}", &macros),
            r"Data Management\emph{x}"
        );
    }

    #[test]
    fn expand_content_is_literal() {
        let macros = MacroTable::from_iter([(r"\sym", r"$\alpha$ \1 ${1}")]);
        assert_eq!(expand_macros(r"Use \sym.", &macros), r"Use $\alpha$ \1 ${1}.");
    }

    #[test]
    fn expand_longest_name_first() {
        let macros = MacroTable::from_iter([(r"\dm", "DM"), (r"\dmtn", "DMTN")]);
        assert_eq!(expand_macros(r"\dmtn and \dm", &macros), "DMTN and DM");
    }

    #[test]
    fn expand_does_not_cascade() {
        let macros = MacroTable::from_iter([(r"\a", r"\b"), (r"\b", "B")]);
        assert_eq!(expand_macros(r"\a \b", &macros), r"\b B");
    }

    #[test]
    fn expand_noop() {
        let macros = MacroTable::from_iter([(r"\unused", "x")]);
        assert_eq!(expand_macros("plain text", &macros), "plain text");
        assert_eq!(expand_macros(r"\unused", &MacroTable::new()), r"\unused");
    }
}
