//! Parser for documents using the standard LaTeX `article` class.

use super::{last_command, resolve_revision, split_authors, ExtractEnv, Parser, TexDocument};
use crate::{
    convert::ConvertOptions,
    metadata::{DocumentMetadata, FormattedString, Person},
    tex::{ArgumentSlot, Bracket, LatexCommand},
};
use anyhow::{Context, Result};
use std::sync::LazyLock;
use tracing::warn;

static TITLE: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "title",
        [
            ArgumentSlot::optional(Bracket::Square).named("short_title"),
            ArgumentSlot::required(Bracket::Curly).named("long_title"),
        ],
    )
});

static AUTHOR: LazyLock<LatexCommand> = LazyLock::new(|| {
    LatexCommand::new(
        "author",
        [ArgumentSlot::required(Bracket::Curly).named("authors")],
    )
});

#[derive(Clone, Copy, Debug)]
pub struct ArticleParser;

impl Parser for ArticleParser {
    fn name(&self) -> &'static str {
        "article"
    }

    fn extract_metadata(
        &self,
        document: &TexDocument,
        env: &ExtractEnv<'_>,
    ) -> Result<DocumentMetadata> {
        let source = document.source.as_str();
        let title = last_command(&TITLE, source)
            .and_then(|parsed| parsed.get("long_title"))
            .context("article has no title")?;

        let mut metadata = DocumentMetadata::new(FormattedString::from_tex(
            title,
            env.converter,
            ConvertOptions::DEPARAGRAPH,
        ));

        // `\and` separates authors in the article class
        match last_command(&AUTHOR, source).and_then(|parsed| parsed.get("authors")) {
            Some(authors) => {
                metadata.authors = split_authors(&authors.replace(r"\and", ","))
                    .iter()
                    .map(|name| {
                        Person::new(FormattedString::from_tex(
                            name,
                            env.converter,
                            ConvertOptions::DEPARAGRAPH,
                        ))
                    })
                    .collect();
            }
            None => warn!("article has no authors"),
        }

        metadata.revision = Some(resolve_revision(None, env.git));
        metadata.full_text = Some(env.converter.convert_or_raw(
            source,
            "latex",
            "plain",
            ConvertOptions::default(),
        ));

        Ok(metadata)
    }
}

#[cfg(test)]
mod test {
    use super::ArticleParser;
    use crate::{
        bib::BibCache,
        gitdata::{GitFile, GitRepository},
        metadata::RevisionSource,
        parser::{test::env, Parser, TexDocument},
    };
    use jiff::Timestamp;
    use std::path::PathBuf;

    fn document(source: &str) -> TexDocument {
        TexDocument {
            path: PathBuf::from("paper.tex"),
            root_dir: PathBuf::from("."),
            source: source.to_owned(),
        }
    }

    #[test]
    fn title_and_authors() {
        let bib = BibCache::new();
        let metadata = ArticleParser
            .extract_metadata(
                &document(
                    "\\documentclass{article}\n\\title{Old}\n\\title[Short]{Measuring Things}\n\\author{Jane Doe \\and John~Roe}\n",
                ),
                &env(&bib, None),
            )
            .expect("metadata should be extracted");

        assert_eq!(metadata.title.tex, "Measuring Things");
        assert_eq!(
            metadata
                .authors
                .iter()
                .map(|person| person.name.plain.as_str())
                .collect::<Vec<_>>(),
            ["Jane Doe", "John Roe"]
        );
        assert_eq!(metadata.identifier, None);
    }

    #[test]
    fn revision_from_git() {
        let committed = Timestamp::from_second(1_600_000_000).expect("timestamp should be valid");
        let repo = GitRepository {
            root: PathBuf::from("/repo"),
            files: vec![GitFile {
                path: PathBuf::from("paper.tex"),
                date_modified: committed,
            }],
        };
        let bib = BibCache::new();
        let metadata = ArticleParser
            .extract_metadata(
                &document("\\title{Paper}\n\\date{2001-01-01}\n"),
                &env(&bib, Some(&repo)),
            )
            .expect("metadata should be extracted");

        let revision = metadata.revision.expect("revision should be resolved");
        assert_eq!(revision.source, RevisionSource::Git);
        assert_eq!(revision.timestamp, committed);
    }

    #[test]
    fn missing_title() {
        let bib = BibCache::new();
        let error = ArticleParser
            .extract_metadata(&document("\\titlename{Nope}\n"), &env(&bib, None))
            .expect_err("extraction should fail");
        assert_eq!(error.to_string(), "article has no title");
    }
}
