//! Code for reading build configuration from a TOML file.
//! Relative paths in the file are resolved against the directory that contains it.

use crate::{
    handles::DocumentHandle,
    metadata::{DocumentMetadata, FormattedString, Person, Revision, RevisionSource},
    parser::{project_date_timestamp, ParserRegistry},
    theme::ThemeRegistry,
};
use anyhow::{anyhow, bail, Context, Result};
use foldhash::{HashSet, HashSetExt};
use glob::glob;
use jiff::civil::Date;
use same_file::is_same_file;
use serde::{
    de::{Error as DeError, Unexpected},
    Deserialize, Deserializer,
};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use toml_edit::de::from_str as toml_from_str;

pub const DEFAULT_CONFIG_FILE: &str = "lander.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // Root TeX file of the document
    pub source_path: PathBuf,
    pub pdf_path: PathBuf,
    #[serde(default = "default_parser")]
    pub parser: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    // Path to directory for generated site output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    pub canonical_url: Option<String>,
    // Glob patterns for extra files to publish next to the PDF
    #[serde(default)]
    pub attachments: Vec<String>,
    // Directory of `lsst-texmf` bibliographies
    pub bibliography_dir: Option<PathBuf>,
    // Markup converter executable
    #[serde(default = "default_pandoc")]
    pub pandoc: PathBuf,
    #[serde(default)]
    pub metadata: MetadataOverrides,
}

/// Values that replace extracted metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataOverrides {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub date_modified: Option<Date>,
    pub license_identifier: Option<String>,
    pub repository_url: Option<String>,
    pub copyright: Option<String>,
    pub version: Option<String>,
    pub keywords: Option<Vec<String>>,
}

fn default_parser() -> String {
    "article".to_owned()
}

fn default_theme() -> String {
    "minimalist".to_owned()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("_build")
}

fn default_pandoc() -> PathBuf {
    PathBuf::from("pandoc")
}

impl Config {
    /// Reads a config file.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - the file cannot be read
    /// - the file is not valid TOML or has missing, unknown, or invalid fields
    /// - a path parameter does not point to a file
    /// - the output directory and the source directory are the same location
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_to_string(path)
            .with_context(|| format!("failed to read configuration from {path:?}"))?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let config = Self::from_toml(&text, base_dir)?;
        config
            .check_paths()
            .context("configuration file is invalid")?;

        Ok(config)
    }

    /// Parses configuration text, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    /// This function returns an error if the text is not valid configuration.
    pub fn from_toml(text: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml_from_str(text).context("failed to parse configuration file")?;

        for path in [
            &mut config.source_path,
            &mut config.pdf_path,
            &mut config.output_dir,
        ] {
            *path = base_dir.join(&*path);
        }
        if let Some(dir) = &mut config.bibliography_dir {
            *dir = base_dir.join(&*dir);
        }
        // A bare executable name is looked up in `PATH`
        if config.pandoc.components().count() > 1 {
            config.pandoc = base_dir.join(&config.pandoc);
        }
        config.attachments = config
            .attachments
            .iter()
            .map(|pattern| base_dir.join(pattern).to_string_lossy().into_owned())
            .collect();

        Ok(config)
    }

    /// Files matched by the attachment patterns, in pattern order.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - a pattern is invalid
    /// - a matched path is not a file
    /// - a file is matched more than once
    pub fn attachment_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut seen = HashSet::new();

        for pattern in &self.attachments {
            let entries = glob(pattern)
                .with_context(|| format!("`attachments`: invalid pattern {pattern:?}"))?;
            for entry in entries {
                let path = entry.context("`attachments`: failed to access matched path")?;
                if !path.is_file() {
                    bail!("`attachments`: {path:?} does not point to a file");
                }
                if !seen.insert(path.clone()) {
                    bail!("`attachments`: {path:?} is matched more than once");
                }
                paths.push(path);
            }
        }

        Ok(paths)
    }

    /// Checks that the parser and theme are registered.
    ///
    /// # Errors
    /// This function returns an error if either name is unknown.
    pub fn check_names(&self, parsers: &ParserRegistry, themes: &ThemeRegistry) -> Result<()> {
        parsers.get(&self.parser).context("`parser` is invalid")?;
        themes.resolve(&self.theme).context("`theme` is invalid")?;
        Ok(())
    }

    fn check_paths(&self) -> Result<()> {
        if !self.source_path.is_file() {
            return Err(anyhow!(
                "`source_path`: {:?} does not point to a file",
                self.source_path
            ));
        }
        if !self.pdf_path.is_file() {
            return Err(anyhow!(
                "`pdf_path`: {:?} does not point to a file",
                self.pdf_path
            ));
        }
        if let Some(dir) = self.bibliography_dir.as_ref().filter(|dir| !dir.is_dir()) {
            return Err(anyhow!(
                "`bibliography_dir`: {dir:?} does not point to a directory"
            ));
        }
        self.attachment_paths()?;

        let source_dir = self
            .source_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // A missing output directory cannot be the same as an existing one
        if matches!(is_same_file(&self.output_dir, source_dir), Ok(true)) {
            Err(anyhow!(
                "`output_dir` and the directory of `source_path` point to the same location"
            ))
        } else {
            Ok(())
        }
    }
}

impl MetadataOverrides {
    /// Replaces extracted fields with configured values.
    ///
    /// # Errors
    /// This function returns an error if a configured date cannot be placed in project time.
    pub fn apply(&self, mut metadata: DocumentMetadata) -> Result<DocumentMetadata> {
        if let Some(title) = &self.title {
            metadata.title = FormattedString::from_plain(title);
        }
        if let Some(authors) = &self.authors {
            metadata.authors = authors
                .iter()
                .map(|name| Person::new(FormattedString::from_plain(name)))
                .collect();
        }
        if let Some(abstract_text) = &self.abstract_text {
            metadata.abstract_text = Some(FormattedString::from_plain(abstract_text));
        }
        if let Some(handle) = &self.handle {
            metadata.identifier = Some(handle.clone());
            let parsed = DocumentHandle::parse(handle);
            metadata.series_name = parsed
                .as_ref()
                .and_then(DocumentHandle::series_name)
                .map(ToOwned::to_owned);
            metadata.series = parsed.as_ref().map(|parsed| parsed.series.clone());
            metadata.serial = parsed.map(|parsed| parsed.serial);
        }
        if let Some(date) = self.date_modified {
            metadata.revision = Some(Revision {
                timestamp: project_date_timestamp(date)?,
                source: RevisionSource::Config,
            });
        }
        for (field, value) in [
            (&mut metadata.license_identifier, &self.license_identifier),
            (&mut metadata.repository_url, &self.repository_url),
            (&mut metadata.copyright, &self.copyright),
            (&mut metadata.version, &self.version),
        ] {
            if value.is_some() {
                field.clone_from(value);
            }
        }
        if let Some(keywords) = &self.keywords {
            metadata.keywords.clone_from(keywords);
        }

        Ok(metadata)
    }
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Deserialize::deserialize(deserializer)?;

    match raw {
        Some(raw) => Ok(Some(raw.parse().map_err(|_| {
            DeError::invalid_value(Unexpected::Str(&raw), &"Expected a date in string form")
        })?)),
        None => Ok(None),
    }
}
