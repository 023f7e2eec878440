//! Parser for documents using the `lsstdoc` class from `lsst-texmf`.

use super::{
    first_command, last_command, resolve_revision, split_authors, ExtractEnv, Parser, TexDocument,
};
use crate::{
    bib::{BibDatabase, KNOWN_LSSTTEXMF_BIB_NAMES},
    convert::ConvertOptions,
    handles::DocumentHandle,
    metadata::{DocumentMetadata, FormattedString, Person},
    tex::{ArgumentSlot, Bracket, CitationLinker, LatexCommand},
};
use anyhow::{bail, Result};
use std::{fs::read_to_string, path::Path, sync::LazyLock};
use tracing::{debug, warn};

// Macros defined by the document class, which the converter would otherwise not know
const LSSTDOC_MACROS: &str = include_str!("lsstdoc_macros.tex");

const DRAFT_OPTION: &str = "lsstdraft";

static DOCUMENTCLASS: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "documentclass",
        [
            ArgumentSlot::optional(Bracket::Square).named("options"),
            ArgumentSlot::required(Bracket::Curly).named("class_name"),
        ],
    )
});

static TITLE: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "title",
        [
            ArgumentSlot::optional(Bracket::Square).named("short_title"),
            ArgumentSlot::required(Bracket::Curly).named("long_title"),
        ],
    )
});

static AUTHOR: LazyLock<LatexCommand> = LazyLock::new(|| single_argument("author", "authors"));
static ABSTRACT: LazyLock<LatexCommand> =
    LazyLock::new(|| single_argument("setDocAbstract", "abstract"));
static DOC_REF: LazyLock<LatexCommand> = LazyLock::new(|| single_argument("setDocRef", "handle"));
static BIBLIOGRAPHY: LazyLock<LatexCommand> =
    LazyLock::new(|| single_argument("bibliography", "bib_names"));
static DATE: LazyLock<LatexCommand> = LazyLock::new(|| single_argument("date", "content"));

fn single_argument(command: &str, argument: &'static str) -> LatexCommand {
    LatexCommand::new(
        command,
        [ArgumentSlot::required(Bracket::Curly).named(argument)],
    )
}

#[derive(Clone, Copy, Debug)]
pub struct LsstDocParser;

impl Parser for LsstDocParser {
    fn name(&self) -> &'static str {
        "lsstdoc"
    }

    fn extract_metadata(
        &self,
        document: &TexDocument,
        env: &ExtractEnv<'_>,
    ) -> Result<DocumentMetadata> {
        let source = document.source.as_str();
        let formatted = |tex: &str, options| {
            FormattedString::from_tex_with_preamble(tex, LSSTDOC_MACROS, env.converter, options)
        };

        let Some(title) = last_command(&TITLE, source) else {
            bail!("lsstdoc document has no title");
        };
        let Some(long_title) = title.get("long_title") else {
            bail!("lsstdoc document has no title");
        };
        let mut metadata = DocumentMetadata::new(formatted(long_title, ConvertOptions::DEPARAGRAPH));
        metadata.short_title = title
            .get("short_title")
            .filter(|short_title| !short_title.is_empty())
            .map(|short_title| formatted(short_title, ConvertOptions::DEPARAGRAPH));

        metadata.is_draft = document_options(source)
            .iter()
            .any(|option| option == DRAFT_OPTION);

        if let Some(authors) = first_command(&AUTHOR, source).and_then(|parsed| parsed.get("authors"))
        {
            metadata.authors = split_authors(authors)
                .iter()
                .map(|name| Person::new(formatted(name.as_str(), ConvertOptions::DEPARAGRAPH)))
                .collect();
        } else {
            warn!("lsstdoc document has no authors");
        }

        if let Some(handle) = first_command(&DOC_REF, source).and_then(|parsed| parsed.get("handle"))
        {
            metadata.identifier = Some(handle.to_owned());
            match DocumentHandle::parse(handle) {
                Some(parsed) => {
                    metadata.series_name = parsed.series_name().map(ToOwned::to_owned);
                    metadata.series = Some(parsed.series);
                    metadata.serial = Some(parsed.serial);
                }
                None => warn!("Document handle {handle:?} has no series and serial number"),
            }
        } else {
            warn!("lsstdoc document has no `\\setDocRef` handle");
        }

        metadata.bibliographies = first_command(&BIBLIOGRAPHY, source)
            .and_then(|parsed| parsed.get("bib_names"))
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(abstract_text) =
            first_command(&ABSTRACT, source).and_then(|parsed| parsed.get("abstract"))
        {
            let bib = load_bibliography(&metadata.bibliographies, &document.root_dir, env);
            let linked = CitationLinker::new(&bib).link(abstract_text);
            metadata.abstract_text = Some(formatted(&linked, ConvertOptions::default()));
        } else {
            warn!("lsstdoc document has no abstract");
        }

        // A draft is dated by its latest change
        let date = if metadata.is_draft {
            debug!("Ignoring `\\date` of draft document");
            None
        } else {
            first_command(&DATE, source)
                .and_then(|parsed| parsed.get("content"))
                .filter(|content| *content != r"\today")
        };
        metadata.revision = Some(resolve_revision(date, env.git));

        metadata.full_text = Some(
            env.converter
                .convert(
                    &format!("{LSSTDOC_MACROS}\n{source}"),
                    "latex",
                    "plain",
                    ConvertOptions::default(),
                )
                .unwrap_or_else(|error| {
                    warn!("Using TeX source as document text: {error:#}");
                    source.to_owned()
                }),
        );

        Ok(metadata)
    }
}

/// Options given to `\documentclass`, like `DM` and `lsstdraft`.
fn document_options(source: &str) -> Vec<String> {
    let Some(documentclass) = first_command(&DOCUMENTCLASS, source) else {
        warn!("lsstdoc document has no `\\documentclass`");
        return Vec::new();
    };

    documentclass
        .get("options")
        .map(|options| {
            options
                .split(',')
                .map(str::trim)
                .filter(|option| !option.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Combines the bibliographies a document cites:
/// `lsst-texmf` bibliographies come from the cache,
/// and any other bibliography is read from `<name>.bib` in the document's root directory.
fn load_bibliography(names: &[String], root_dir: &Path, env: &ExtractEnv<'_>) -> BibDatabase {
    let (known, custom): (Vec<&str>, Vec<&str>) = names
        .iter()
        .map(String::as_str)
        .partition(|name| KNOWN_LSSTTEXMF_BIB_NAMES.contains(name));

    let mut database = env.bib.database_for(known);
    for name in custom {
        let path = root_dir.join(format!("{name}.bib"));
        match read_to_string(&path) {
            Ok(bibtex) => database.merge(BibDatabase::parse(&bibtex)),
            Err(error) => warn!("Could not read bibliography {path:?}: {error}"),
        }
    }

    debug!("Loaded {} bibliography entries", database.len());
    database
}

#[cfg(test)]
mod test {
    use super::{document_options, LsstDocParser};
    use crate::{
        bib::BibCache,
        metadata::RevisionSource,
        parser::{test::env, Parser},
        tex::read_tex_file,
    };
    use pretty_assertions::assert_eq;
    use std::fs::write;
    use tempfile::tempdir;

    const DOCUMENT: &str = r"\documentclass[DM,lsstdraft,toc]{lsstdoc}
\input{abstract}
\title[Pipelines Design]{Data Management Science Pipelines Design}
\author{
A.~Author,
B.~Author,
and
C.~Author}
\setDocRef{LDM-151}
\date{2017-09-06}
\bibliography{lsst,local}
\begin{document}
\maketitle
\end{document}
";

    #[test]
    fn two_file_project() {
        let dir = tempdir().expect("temporary directory should be created");
        let root = dir.path().join("LDM-151.tex");
        write(&root, DOCUMENT).expect("root file should be written");
        write(dir.path().join("abstract.tex"), "\\setDocAbstract{Some text.}\n")
            .expect("abstract file should be written");

        let flattened = read_tex_file(&root).expect("project should be read");
        assert!(flattened.contains(r"\setDocAbstract{Some text.}"));

        let bib = BibCache::new();
        let metadata = LsstDocParser
            .parse(&root, &env(&bib, None))
            .expect("metadata should be extracted");

        assert_eq!(
            metadata.abstract_text.map(|text| text.tex).as_deref(),
            Some("Some text.")
        );
        assert_eq!(metadata.title.tex, "Data Management Science Pipelines Design");
        assert_eq!(
            metadata.short_title.map(|title| title.tex).as_deref(),
            Some("Pipelines Design")
        );
        assert_eq!(
            metadata
                .authors
                .iter()
                .map(|person| person.name.tex.as_str())
                .collect::<Vec<_>>(),
            ["A. Author", "B. Author", "C. Author"]
        );
        assert_eq!(metadata.identifier.as_deref(), Some("LDM-151"));
        assert_eq!(metadata.series.as_deref(), Some("LDM"));
        assert_eq!(metadata.serial.as_deref(), Some("151"));
        assert_eq!(
            metadata.series_name.as_deref(),
            Some("LSST Data Management")
        );
        assert_eq!(metadata.bibliographies, ["lsst", "local"]);
        assert!(metadata.is_draft);
        // The date is ignored for drafts, and there is no Git repository to fall back on
        assert_eq!(
            metadata.revision.map(|revision| revision.source),
            Some(RevisionSource::Now)
        );
        assert!(metadata.full_text.is_some_and(|text| text.contains(r"\maketitle")));
    }

    #[test]
    fn released_document_date() {
        let dir = tempdir().expect("temporary directory should be created");
        let root = dir.path().join("doc.tex");
        write(
            &root,
            "\\documentclass[DM]{lsstdoc}\n\\title{Title}\n\\date{2017-09-06}\n",
        )
        .expect("root file should be written");

        let bib = BibCache::new();
        let metadata = LsstDocParser
            .parse(&root, &env(&bib, None))
            .expect("metadata should be extracted");
        let revision = metadata.revision.expect("revision should be resolved");

        assert!(!metadata.is_draft);
        assert_eq!(revision.source, RevisionSource::Tex);
        assert_eq!(revision.timestamp.to_string(), "2017-09-06T07:00:00Z");

        write(&root, "\\documentclass{lsstdoc}\n\\title{Title}\n\\date{\\today}\n")
            .expect("root file should be written");
        let metadata = LsstDocParser
            .parse(&root, &env(&bib, None))
            .expect("metadata should be extracted");
        assert_eq!(
            metadata.revision.map(|revision| revision.source),
            Some(RevisionSource::Now)
        );
    }

    #[test]
    fn last_title_wins_and_missing_fields() {
        let dir = tempdir().expect("temporary directory should be created");
        let root = dir.path().join("doc.tex");
        write(
            &root,
            "\\title{Draft Title}\n\\titlename{Not a title}\n\\title{Final Title}\n\\setDocRef{XYZ-7}\n\\setDocAbstract\n",
        )
        .expect("root file should be written");

        let bib = BibCache::new();
        let metadata = LsstDocParser
            .parse(&root, &env(&bib, None))
            .expect("metadata should be extracted");

        assert_eq!(metadata.title.tex, "Final Title");
        assert_eq!(metadata.short_title, None);
        assert!(metadata.authors.is_empty());
        assert_eq!(metadata.abstract_text, None);
        assert_eq!(metadata.series.as_deref(), Some("XYZ"));
        assert_eq!(metadata.series_name, None);
        assert!(!metadata.is_draft);
    }

    #[test]
    fn missing_title() {
        let dir = tempdir().expect("temporary directory should be created");
        let root = dir.path().join("doc.tex");
        write(&root, "\\author{A. Author}\n").expect("root file should be written");

        let bib = BibCache::new();
        assert!(LsstDocParser.parse(&root, &env(&bib, None)).is_err());
    }

    #[test]
    fn abstract_citations() {
        let dir = tempdir().expect("temporary directory should be created");
        let root = dir.path().join("doc.tex");
        write(
            &root,
            "\\title{Title}\n\\bibliography{lsst,local}\n\\setDocAbstract{See \\citeds{LDM-151} and \\citep{Doe2020}.}\n",
        )
        .expect("root file should be written");
        write(
            dir.path().join("local.bib"),
            "@article{Doe2020,\n  author = {Doe, Jane},\n  title = {A Paper},\n  year = {2020},\n  url = {https://example.org/doe}\n}\n",
        )
        .expect("bibliography should be written");

        let bib = BibCache::new();
        let metadata = LsstDocParser
            .parse(&root, &env(&bib, None))
            .expect("metadata should be extracted");

        assert_eq!(
            metadata.abstract_text.map(|text| text.tex).as_deref(),
            Some(
                r"See \href{https://ls.st/LDM-151}{LDM-151} and [\href{https://example.org/doe}{Doe 2020}]."
            )
        );
    }

    #[test]
    fn options() {
        assert_eq!(
            document_options("\\documentclass[DM, lsstdraft ,]{lsstdoc}"),
            ["DM", "lsstdraft"]
        );
        assert!(document_options("\\documentclass{lsstdoc}").is_empty());
        assert!(document_options("No class").is_empty());
    }
}
