//! Code for describing a document as JSON-LD (schema.org `Report` and CodeMeta `SoftwareSourceCode`).

use crate::metadata::DocumentMetadata;
use anyhow::{Context, Result};
use jiff::{civil::DateTime, tz::TimeZone, Timestamp};
use serde_json::{json, Value};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats a timestamp as UTC, like `2018-01-01T12:00:00Z`.
#[must_use]
pub fn encode_datetime(timestamp: Timestamp) -> String {
    timestamp.strftime(DATETIME_FORMAT).to_string()
}

/// Parses a UTC datetime in the format written by [`encode_datetime`].
///
/// # Errors
/// This function returns an error if the text does not match the format.
pub fn decode_datetime(text: &str) -> Result<Timestamp> {
    DateTime::strptime(DATETIME_FORMAT, text)
        .and_then(|datetime| datetime.to_zoned(TimeZone::UTC))
        .map(|zoned| zoned.timestamp())
        .with_context(|| format!("{text:?} is not a UTC datetime"))
}

/// Builds the JSON-LD description of a document.
/// The `@id` is the canonical URL if there is one, and otherwise the document handle.
#[must_use]
pub fn build_jsonld(metadata: &DocumentMetadata) -> Value {
    let authors: Vec<Value> = metadata
        .authors
        .iter()
        .map(|person| json!({"@type": "Person", "name": person.name.plain}))
        .collect();

    let mut jsonld = json!({
        "@context": [
            "https://raw.githubusercontent.com/codemeta/codemeta/2.0/codemeta.jsonld",
            "http://schema.org",
        ],
        "@type": ["Report", "SoftwareSourceCode"],
        "language": "TeX",
        "reportNumber": metadata.identifier,
        "name": metadata.title.plain,
        "description": metadata.abstract_text.as_ref().map(|text| &text.plain),
        "author": authors,
        "dateModified": metadata.revision.map(|revision| encode_datetime(revision.timestamp)),
        "@id": metadata.canonical_url.as_ref().or(metadata.identifier.as_ref()),
    });

    let optional = [
        ("url", metadata.canonical_url.as_ref()),
        ("articleBody", metadata.full_text.as_ref()),
        ("codeRepository", metadata.repository_url.as_ref()),
        ("contIntegration", metadata.ci_url.as_ref()),
        ("license_id", metadata.license_identifier.as_ref()),
        ("version", metadata.version.as_ref()),
    ];
    if let Some(object) = jsonld.as_object_mut() {
        for (key, value) in optional {
            if let Some(value) = value {
                object.insert(key.to_owned(), Value::from(value.as_str()));
            }
        }
        if !metadata.keywords.is_empty() {
            object.insert("keywords".to_owned(), Value::from(metadata.keywords.clone()));
        }
        if metadata.full_text.is_some() {
            object.insert("fileFormat".to_owned(), Value::from("text/plain"));
        }
    }

    jsonld
}
