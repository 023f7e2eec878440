//! Code for reading BibTeX bibliographies for citation linking.
//!
//! Only what is needed to link citations is kept: entry types, keys, and field values.
//! `@string` macros are expanded while reading, and values are kept as written
//! apart from collapsing whitespace.

use anyhow::{Context, Result};
use foldhash::{HashMap, HashMapExt};
use glob::glob;
use serde::Deserialize;
use serde_bibtex::de::Deserializer;
use std::{collections::BTreeMap, fs::read_to_string, path::Path};
use tracing::{info, warn};

/// Names of the bibliographies distributed with lsst-texmf.
pub const KNOWN_LSSTTEXMF_BIB_NAMES: [&str; 5] = ["lsst", "lsst-dm", "refs", "books", "refs_ads"];

/// One bibliography entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BibEntry {
    // Lowercase entry type, like `article` or `docushare`
    pub entry_type: String,
    pub key: String,
    // Lowercase field names mapped to their values
    pub fields: HashMap<String, String>,
}

impl BibEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The best available URL for the entry. In order of priority:
    /// 1. the `url` field
    /// 2. an `ls.st` URL from the handle of a `@docushare` entry
    /// 3. the `adsurl` field
    /// 4. a `doi.org` URL from the `doi` field
    #[must_use]
    pub fn url(&self) -> Option<String> {
        if let Some(url) = self.field("url") {
            Some(url.to_owned())
        } else if let Some(handle) = self.field("handle").filter(|_| self.entry_type == "docushare") {
            Some(format!("https://ls.st/{handle}"))
        } else if let Some(url) = self.field("adsurl") {
            Some(url.to_owned())
        } else {
            self.field("doi").map(|doi| format!("https://doi.org/{doi}"))
        }
    }

    /// Author-year citation text in the style of natbib, like `Bell and de Jong 2001`.
    /// Editors are used when there are no authors.
    /// Returns `None` if the entry has no year or no people.
    #[must_use]
    pub fn author_year(&self) -> Option<String> {
        let year = self.field("year")?;
        let people = self
            .field("author")
            .or_else(|| self.field("editor"))
            .map(split_people)
            .filter(|people| !people.is_empty())?;

        let last_names: Vec<String> = people.iter().map(|person| last_name(person)).collect();

        Some(match last_names.as_slice() {
            [only] => format!("{only} {year}"),
            [first, second] => format!("{first} and {second} {year}"),
            [first, ..] => format!("{first} et al {year}"),
            [] => return None,
        })
    }
}

// A regular entry as the deserializer yields it
#[derive(Deserialize)]
struct RawEntry {
    entry_type: String,
    entry_key: String,
    fields: BTreeMap<String, String>,
}

impl From<RawEntry> for BibEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            entry_type: raw.entry_type.to_ascii_lowercase(),
            key: raw.entry_key,
            fields: raw
                .fields
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(&value)))
                .collect(),
        }
    }
}

/// Bibliography entries keyed by citation key. Key lookup is case-insensitive.
#[derive(Clone, Debug, Default)]
pub struct BibDatabase {
    entries: HashMap<String, BibEntry>,
}

impl BibDatabase {
    /// Reads the entries of BibTeX source.
    /// Reading stops at the first malformed entry, keeping the entries before it.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut entries = HashMap::new();

        for entry in Deserializer::from_str(source).into_iter_regular_entry::<RawEntry>() {
            match entry {
                Ok(raw) => {
                    let entry = BibEntry::from(raw);
                    entries.insert(entry.key.to_lowercase(), entry);
                }
                Err(error) => {
                    warn!("Stopped reading malformed BibTeX: {error}");
                    break;
                }
            }
        }

        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(&key.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds all entries of another database, replacing entries with the same key.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

/// Parsed bibliographies kept by name, so they are read once per run rather than once per document.
#[derive(Debug, Default)]
pub struct BibCache {
    databases: HashMap<String, BibDatabase>,
}

impl BibCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a bibliography under `name`, replacing any bibliography of the same name.
    pub fn insert(&mut self, name: impl Into<String>, source: &str) {
        self.databases.insert(name.into(), BibDatabase::parse(source));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BibDatabase> {
        self.databases.get(name)
    }

    /// Stores every `.bib` file in a directory, named by file stem.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - the directory path cannot be turned into a glob pattern
    /// - a bibliography file cannot be read
    pub fn populate_from_dir(&mut self, dir: &Path) -> Result<()> {
        let pattern = dir.join("*.bib");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("bibliography directory {dir:?} is not valid UTF-8"))?;

        for path in glob(pattern).context("failed to build bibliography glob pattern")? {
            let path = path.context("failed to access bibliography file")?;
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let source = read_to_string(&path)
                .with_context(|| format!("failed to read bibliography from {path:?}"))?;
            self.insert(name, &source);
        }

        info!("Cached {} bibliographies from {dir:?}", self.databases.len());
        Ok(())
    }

    /// Merges the cached bibliographies with the given names into one database.
    /// Names that are not cached are skipped with a warning.
    #[must_use]
    pub fn database_for<'n, I>(&self, names: I) -> BibDatabase
    where
        I: IntoIterator<Item = &'n str>,
    {
        let mut database = BibDatabase::default();
        for name in names {
            match self.get(name) {
                Some(cached) => database.merge(cached.clone()),
                None => warn!("Bibliography `{name}` is not cached"),
            }
        }
        database
    }
}

/// Splits a BibTeX name list on ` and ` outside of braces.
fn split_people(names: &str) -> Vec<&str> {
    let mut people = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    let bytes = names.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b' ' if depth == 0 && names[i..].starts_with(" and ") => {
                people.push(names[start..i].trim());
                i += " and ".len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    people.push(names[start..].trim());

    people.retain(|person| !person.is_empty());
    people
}

/// The last name of one BibTeX person, with brace wrappers removed.
/// Handles both `Last, First` and `First Last` forms; a braced group counts as one word.
fn last_name(person: &str) -> String {
    let mut depth = 0_usize;
    let mut words = Vec::new();
    let mut word_start = 0;

    for (i, c) in person.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                // `Last, First`: everything before the first comma
                return strip_braces(&person[..i]);
            }
            c if c.is_whitespace() && depth == 0 => {
                words.push(&person[word_start..i]);
                word_start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    words.push(&person[word_start..]);

    words
        .into_iter()
        .rev()
        .find(|word| !word.is_empty())
        .map(strip_braces)
        .unwrap_or_default()
}

fn strip_braces(text: &str) -> String {
    text.chars().filter(|&c| c != '{' && c != '}').collect::<String>().trim().to_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod test {
    use super::{split_people, BibCache, BibDatabase};
    use pretty_assertions::assert_eq;
    use std::fs::write;
    use tempfile::tempdir;

    const BELL: &str = r#"
@ARTICLE{2001ApJ...550..212B,
  author = {{Bell}, E.~F. and {de Jong}, R.~S.},
  title = "{Stellar Mass-to-Light Ratios and the Tully-Fisher
    Relation}",
  journal = {\apj},
  year = 2001,
  doi = {10.1086/319728},
  adsurl = {http://adsabs.harvard.edu/abs/2001ApJ...550..212B},
}
"#;

    const LSST: &str = r#"
@comment{ This file is generated }
@string{ lsst = "LSST" }
@DocuShare{LDM-151,
   author = { John D. Swinbank and others},
   title = "{Data Management Science Pipelines Design}",
   year = 2017,
   handle = {LDM-151},
}
@Misc{book,
   editor = {Jane Doe and Richard Roe and Someone Else},
   year = {2010},
}
@Misc(nourl, author = "Anon", title = "No " # "link")
"#;

    #[test]
    fn parse_entries() {
        let database = BibDatabase::parse(BELL);
        assert_eq!(database.len(), 1);

        let entry = database
            .get("2001ApJ...550..212B")
            .expect("entry should be parsed");
        assert_eq!(entry.entry_type, "article");
        assert_eq!(
            entry.field("title").map(|title| title.trim_matches(['{', '}'])),
            Some("Stellar Mass-to-Light Ratios and the Tully-Fisher Relation")
        );
        assert_eq!(entry.field("year"), Some("2001"));
        assert_eq!(entry.field("journal"), Some(r"\apj"));
    }

    #[test]
    fn skips_non_entries() {
        let database = BibDatabase::parse(LSST);
        assert_eq!(database.len(), 3);
        assert!(database.get("ldm-151").is_some(), "lookup is case-insensitive");
        assert_eq!(
            database.get("nourl").and_then(|entry| entry.field("title")),
            Some("No link")
        );
    }

    #[test]
    fn urls() {
        let bell = BibDatabase::parse(BELL);
        assert_eq!(
            bell.get("2001ApJ...550..212B").and_then(|entry| entry.url()).as_deref(),
            Some("http://adsabs.harvard.edu/abs/2001ApJ...550..212B")
        );

        let lsst = BibDatabase::parse(LSST);
        assert_eq!(
            lsst.get("LDM-151").and_then(|entry| entry.url()).as_deref(),
            Some("https://ls.st/LDM-151")
        );
        assert_eq!(lsst.get("nourl").and_then(|entry| entry.url()), None);

        let doi = BibDatabase::parse("@article{x, doi = {10.1/abc}}");
        assert_eq!(
            doi.get("x").and_then(|entry| entry.url()).as_deref(),
            Some("https://doi.org/10.1/abc")
        );
    }

    #[test]
    fn author_year() {
        let bell = BibDatabase::parse(BELL);
        assert_eq!(
            bell.get("2001ApJ...550..212B").and_then(|entry| entry.author_year()).as_deref(),
            Some("Bell and de Jong 2001")
        );

        let lsst = BibDatabase::parse(LSST);
        assert_eq!(
            lsst.get("LDM-151").and_then(|entry| entry.author_year()).as_deref(),
            Some("Swinbank and others 2017")
        );
        assert_eq!(
            lsst.get("book").and_then(|entry| entry.author_year()).as_deref(),
            Some("Doe et al 2010")
        );
        // No year
        assert_eq!(lsst.get("nourl").and_then(|entry| entry.author_year()), None);
    }

    #[test]
    fn people() {
        assert_eq!(
            split_people("{Bell}, E.~F. and {de Jong}, R.~S."),
            ["{Bell}, E.~F.", "{de Jong}, R.~S."]
        );
        assert_eq!(
            split_people("{Smith and Wesson} and A. Anderson"),
            ["{Smith and Wesson}", "A. Anderson"]
        );
    }

    #[test]
    fn cache() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("lsst.bib"), LSST).expect("fixture should be written");
        write(dir.path().join("refs_ads.bib"), BELL).expect("fixture should be written");
        write(dir.path().join("notes.txt"), "not a bibliography").expect("fixture should be written");

        let mut cache = BibCache::new();
        cache
            .populate_from_dir(dir.path())
            .expect("cache should be populated");
        assert!(cache.get("lsst").is_some());
        assert!(cache.get("notes").is_none());

        let database = cache.database_for(["lsst", "refs_ads", "missing"]);
        assert_eq!(database.len(), 4);

        let mut local = BibCache::new();
        local.insert("local", "@misc{k, year = 1999}");
        assert_eq!(local.database_for(["local"]).len(), 1);
    }
}
