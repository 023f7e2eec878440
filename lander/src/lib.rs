//! Landing page generation for PDF documents built from LaTeX.
//!
//! Metadata is extracted from TeX source by a [`Parser`] and rendered by a [`Theme`]
//! into a static site next to a copy of the PDF.

mod bib;
mod config;
mod convert;
mod error;
mod gitdata;
mod handles;
mod jsonld;
mod metadata;
mod parser;
pub mod tex;
mod theme;

pub use bib::{BibCache, BibDatabase, BibEntry, KNOWN_LSSTTEXMF_BIB_NAMES};
pub use config::{Config, MetadataOverrides, DEFAULT_CONFIG_FILE};
pub use convert::{deparagraph, ConvertOptions, MarkupConverter, PandocConverter};
pub use error::{CommandParseError, TexError};
pub use gitdata::{GitFile, GitRepository};
pub use handles::{series_name, DocumentHandle};
pub use jsonld::{build_jsonld, decode_datetime, encode_datetime};
pub use metadata::{
    escape_html, DocumentMetadata, FormattedString, Person, Revision, RevisionSource,
};
pub use parser::{
    project_date_timestamp, ArticleParser, ExtractEnv, LsstDocParser, Parser, ParserRegistry,
    TexDocument,
};
pub use theme::{
    build_site, BaseTheme, MinimalistTheme, Site, SiteContext, Theme, ThemeRegistry,
};
