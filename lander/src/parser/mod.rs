//! Document parsers: each one reads a TeX project and extracts a [`DocumentMetadata`].

mod article;
mod lsstdoc;

pub use article::ArticleParser;
pub use lsstdoc::LsstDocParser;

use crate::{
    bib::BibCache,
    convert::MarkupConverter,
    gitdata::GitRepository,
    metadata::{DocumentMetadata, Revision, RevisionSource},
    tex::{expand_macros, read_tex_file, scrape_macros, LatexCommand, ParsedCommand},
};
use anyhow::{anyhow, Context, Result};
use jiff::{civil::Date, tz::TimeZone, Timestamp};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

// Files whose commits count as changes to document content
const CONTENT_EXTENSIONS: [&str; 5] = ["tex", "bib", "pdf", "png", "jpg"];

// Dates without a time are taken as the start of the day in project time
const PROJECT_TIME_ZONE: &str = "America/Los_Angeles";

/// A TeX project after normalization and macro expansion.
#[derive(Clone, Debug)]
pub struct TexDocument {
    pub path: PathBuf,
    // Directory that included files and custom bibliographies are resolved against
    pub root_dir: PathBuf,
    pub source: String,
}

/// Collaborators available to parsers while extracting metadata.
#[derive(Clone, Copy)]
pub struct ExtractEnv<'e> {
    pub converter: &'e dyn MarkupConverter,
    pub bib: &'e BibCache,
    pub git: Option<&'e GitRepository>,
}

pub trait Parser {
    /// The name configuration uses to select this parser.
    fn name(&self) -> &'static str;

    /// Processes the source after it is read and before metadata is extracted.
    /// By default, macros defined in the source are expanded.
    fn normalize_source(&self, source: &str) -> String {
        let macros = scrape_macros(source);
        debug!("Expanding {} macros", macros.len());
        expand_macros(source, &macros)
    }

    /// Extracts metadata from a normalized document.
    ///
    /// # Errors
    /// This function returns an error if a field every document must have cannot be extracted.
    fn extract_metadata(
        &self,
        document: &TexDocument,
        env: &ExtractEnv<'_>,
    ) -> Result<DocumentMetadata>;

    /// Reads the TeX project rooted at `path` and extracts its metadata.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - the root file or a file it includes cannot be read
    /// - metadata extraction fails
    fn parse(&self, path: &Path, env: &ExtractEnv<'_>) -> Result<DocumentMetadata> {
        let source = read_tex_file(path)
            .with_context(|| format!("failed to read TeX project at {path:?}"))?;
        let document = TexDocument {
            path: path.to_path_buf(),
            root_dir: path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
            source: self.normalize_source(&source),
        };

        debug!("Extracting metadata from {path:?} with the `{}` parser", self.name());
        self.extract_metadata(&document, env)
            .with_context(|| format!("failed to extract metadata from {path:?}"))
    }
}

/// Parsers by name.
pub struct ParserRegistry {
    parsers: BTreeMap<&'static str, Box<dyn Parser>>,
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: BTreeMap::new(),
        }
    }

    /// A registry holding the `article` and `lsstdoc` parsers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ArticleParser));
        registry.register(Box::new(LsstDocParser));
        registry
    }

    /// Adds a parser, replacing any parser with the same name.
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.insert(parser.name(), parser);
    }

    /// # Errors
    /// This function returns an error if no parser has the given name.
    pub fn get(&self, name: &str) -> Result<&dyn Parser> {
        self.parsers
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| {
                anyhow!(
                    "unknown parser `{name}` (available: {})",
                    self.names().collect::<Vec<_>>().join(", ")
                )
            })
    }

    /// Registered parser names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.keys().copied()
    }
}

/// The first invocation of a command.
/// A missing command or one whose arguments cannot be parsed is logged and gives `None`.
fn first_command<'a>(command: &'a LatexCommand, source: &'a str) -> Option<ParsedCommand<'a>> {
    match command.parse(source).next() {
        Some(Ok(parsed)) => Some(parsed),
        Some(Err(error)) => {
            warn!("{error}");
            None
        }
        None => {
            debug!("Document has no `\\{}` command", command.name());
            None
        }
    }
}

/// The last invocation of a command whose arguments can be parsed.
fn last_command<'a>(command: &'a LatexCommand, source: &'a str) -> Option<ParsedCommand<'a>> {
    let mut last = None;
    for result in command.parse(source) {
        match result {
            Ok(parsed) => last = Some(parsed),
            Err(error) => warn!("{error}"),
        }
    }
    last
}

/// Splits an author list like `A.~Author, B.~Author,\nand C.~Author` into names.
fn split_authors(content: &str) -> Vec<String> {
    let content = content.replace(['\n', '~'], " ");
    content
        .split(',')
        .flat_map(|part| part.split("and "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parses a `YYYY-MM-DD` date as the start of that day in project time.
fn parse_project_date(text: &str) -> Result<Timestamp> {
    let date = Date::strptime("%Y-%m-%d", text.trim())
        .with_context(|| format!("{text:?} is not a YYYY-MM-DD date"))?;
    project_date_timestamp(date)
}

/// The start of a day in project time (`America/Los_Angeles`).
///
/// # Errors
/// This function returns an error if the time zone database has no entry for project time.
pub fn project_date_timestamp(date: Date) -> Result<Timestamp> {
    let time_zone = TimeZone::get(PROJECT_TIME_ZONE)
        .with_context(|| format!("failed to load time zone {PROJECT_TIME_ZONE}"))?;
    let zoned = date
        .to_zoned(time_zone)
        .with_context(|| format!("{date} does not exist in {PROJECT_TIME_ZONE}"))?;
    Ok(zoned.timestamp())
}

/// Resolves when the document was last revised:
/// an explicit date if one is given and parses,
/// else the newest commit touching document content,
/// else the current time.
fn resolve_revision(date: Option<&str>, git: Option<&GitRepository>) -> Revision {
    if let Some(date) = date {
        match parse_project_date(date) {
            Ok(timestamp) => {
                return Revision {
                    timestamp,
                    source: RevisionSource::Tex,
                }
            }
            Err(error) => warn!("Ignoring document date: {error:#}"),
        }
    }

    match git.map(|repo| repo.compute_date_modified(&CONTENT_EXTENSIONS)) {
        Some(Some(timestamp)) => Revision {
            timestamp,
            source: RevisionSource::Git,
        },
        Some(None) => {
            warn!("Git repository has no committed document content; using the current time");
            now()
        }
        None => {
            debug!("No Git repository; using the current time");
            now()
        }
    }
}

fn now() -> Revision {
    Revision {
        timestamp: Timestamp::now(),
        source: RevisionSource::Now,
    }
}
