//! The document metadata model produced by parsers and consumed by themes.

use crate::{
    convert::{ConvertOptions, MarkupConverter},
    jsonld::encode_datetime,
};
use jiff::Timestamp;
use serde::{Serialize, Serializer};
use tracing::warn;

/// One text field in its source markup plus HTML and plain-text encodings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormattedString {
    pub tex: String,
    pub html: String,
    pub plain: String,
}

impl FormattedString {
    /// Converts TeX source into HTML and plain text.
    /// Conversion failures fall back to the TeX source for that encoding.
    pub fn from_tex(
        tex: &str,
        converter: &dyn MarkupConverter,
        options: ConvertOptions,
    ) -> Self {
        Self::from_tex_with_preamble(tex, "", converter, options)
    }

    /// Like [`Self::from_tex`], with macro definitions the converter should see before the content.
    pub fn from_tex_with_preamble(
        tex: &str,
        preamble: &str,
        converter: &dyn MarkupConverter,
        options: ConvertOptions,
    ) -> Self {
        let source = if preamble.is_empty() {
            tex.to_owned()
        } else {
            format!("{preamble}\n{tex}")
        };

        let convert = |to| match converter.convert(&source, "latex", to, options) {
            Ok(converted) => converted,
            Err(error) => {
                warn!("Using unconverted TeX for {to} output: {error:#}");
                tex.to_owned()
            }
        };

        Self {
            tex: tex.to_owned(),
            html: convert("html5"),
            plain: convert("plain"),
        }
    }

    /// Wraps plain text that needs no conversion, escaping it for the HTML encoding.
    #[must_use]
    pub fn from_plain(text: &str) -> Self {
        Self {
            tex: text.to_owned(),
            html: escape_html(text),
            plain: text.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Person {
    pub name: FormattedString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,
}

impl Person {
    #[must_use]
    pub fn new(name: FormattedString) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Where a revision date came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionSource {
    // An explicit date in the document source
    Tex,
    // The newest commit touching document content
    Git,
    // The time of the build
    Now,
    // A date from configuration
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Revision {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: Timestamp,
    pub source: RevisionSource,
}

/// Metadata for one document. Only the title is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: FormattedString,
    pub short_title: Option<FormattedString>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<FormattedString>,
    pub authors: Vec<Person>,
    // Handle, like `LDM-151`
    pub identifier: Option<String>,
    pub series: Option<String>,
    pub serial: Option<String>,
    pub series_name: Option<String>,
    pub is_draft: bool,
    #[serde(rename = "date_modified")]
    pub revision: Option<Revision>,
    pub bibliographies: Vec<String>,
    pub version: Option<String>,
    pub keywords: Vec<String>,
    // Plain-text body of the document
    #[serde(skip_serializing)]
    pub full_text: Option<String>,
    pub canonical_url: Option<String>,
    pub repository_url: Option<String>,
    pub ci_url: Option<String>,
    pub copyright: Option<String>,
    pub license_identifier: Option<String>,
}

impl DocumentMetadata {
    #[must_use]
    pub fn new(title: FormattedString) -> Self {
        Self {
            title,
            ..Self::default()
        }
    }
}

fn serialize_timestamp<S>(timestamp: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode_datetime(*timestamp))
}

/// Escapes the characters with special meaning in HTML text and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
