//! Site themes and the code that assembles a landing page site in an output directory.

mod base;
mod css;
mod minimalist;
mod page;

pub use base::BaseTheme;
pub use minimalist::MinimalistTheme;

use crate::{jsonld::build_jsonld, metadata::DocumentMetadata};
use anyhow::{anyhow, bail, Context, Result};
use css::minify_css;
use foldhash::{HashSet, HashSetExt};
use include_dir::Dir;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::{copy, create_dir_all, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// What a theme needs to render the landing page.
pub struct SiteContext<'a> {
    pub metadata: &'a DocumentMetadata,
    // File names relative to the site root
    pub pdf_name: &'a str,
    pub attachments: &'a [String],
}

pub trait Theme {
    /// The name configuration uses to select this theme.
    fn name(&self) -> &'static str;

    /// The theme whose assets are written before this theme's assets.
    fn base(&self) -> Option<&'static str> {
        None
    }

    /// Static files written to the site root. Stylesheets are minified.
    fn assets(&self) -> &'static Dir<'static>;

    /// Renders `index.html`.
    ///
    /// # Errors
    /// This function returns an error if the page cannot be rendered.
    fn render_index(&self, site: &SiteContext<'_>) -> Result<String>;
}

/// Themes by name.
pub struct ThemeRegistry {
    themes: BTreeMap<&'static str, Box<dyn Theme>>,
}

impl ThemeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            themes: BTreeMap::new(),
        }
    }

    /// A registry holding the `base` and `minimalist` themes.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BaseTheme));
        registry.register(Box::new(MinimalistTheme));
        registry
    }

    /// Adds a theme, replacing any theme with the same name.
    pub fn register(&mut self, theme: Box<dyn Theme>) {
        self.themes.insert(theme.name(), theme);
    }

    /// # Errors
    /// This function returns an error if no theme has the given name.
    pub fn get(&self, name: &str) -> Result<&dyn Theme> {
        self.themes.get(name).map(Box::as_ref).ok_or_else(|| {
            anyhow!(
                "unknown theme `{name}` (available: {})",
                self.names().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Registered theme names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.themes.keys().copied()
    }

    /// The named theme preceded by the themes it builds on, outermost base first.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - a theme in the chain is not registered
    /// - the chain of base themes loops
    pub fn resolve(&self, name: &str) -> Result<Vec<&dyn Theme>> {
        let mut chain: Vec<&dyn Theme> = Vec::new();
        let mut next = Some(name);

        while let Some(name) = next {
            let theme = self.get(name)?;
            if chain.iter().any(|known| known.name() == theme.name()) {
                bail!("theme `{name}` is its own base");
            }
            chain.push(theme);
            next = theme.base();
        }

        chain.reverse();
        Ok(chain)
    }
}

/// Inputs to a site build.
pub struct Site<'a> {
    pub metadata: &'a DocumentMetadata,
    pub pdf_path: &'a Path,
    // Files copied to the site root next to the PDF
    pub attachments: &'a [PathBuf],
    pub output_dir: &'a Path,
}

#[derive(Serialize)]
struct SiteMetadata<'a> {
    #[serde(flatten)]
    metadata: &'a DocumentMetadata,
    pdf: &'a str,
    attachments: &'a [String],
}

/// Builds the landing page site for a document with the named theme.
///
/// The output directory receives the assets of every theme in the chain (base themes first),
/// copies of the PDF and attachments, `index.html`, `metadata.json`, and `metadata.jsonld`.
///
/// # Errors
/// This function returns an error if:
/// - the theme cannot be resolved
/// - two copied files have the same name
/// - any file cannot be read or written
/// - a theme stylesheet is not valid CSS
/// - the page cannot be rendered
pub fn build_site(registry: &ThemeRegistry, theme_name: &str, site: &Site<'_>) -> Result<()> {
    let themes = registry.resolve(theme_name)?;
    let output_dir = site.output_dir;

    create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory at {output_dir:?}"))?;

    for theme in &themes {
        write_assets(theme.assets(), output_dir)
            .with_context(|| format!("failed to write assets of theme `{}`", theme.name()))?;
    }

    let pdf_name = file_name(site.pdf_path)?;
    let mut copied_names = HashSet::with_capacity(site.attachments.len() + 1);
    copied_names.insert(pdf_name.clone());
    copy_to_site(site.pdf_path, output_dir, &pdf_name)?;

    let mut attachments = Vec::with_capacity(site.attachments.len());
    for path in site.attachments {
        let name = file_name(path)?;
        if !copied_names.insert(name.clone()) {
            bail!("more than one site file is named {name:?}");
        }
        copy_to_site(path, output_dir, &name)?;
        attachments.push(name);
    }

    let context = SiteContext {
        metadata: site.metadata,
        pdf_name: &pdf_name,
        attachments: &attachments,
    };
    // The last theme in the chain is the one that was asked for
    let theme = themes
        .last()
        .ok_or_else(|| anyhow!("theme `{theme_name}` resolved to nothing"))?;
    let index = theme
        .render_index(&context)
        .context("failed to render landing page")?;
    write_site_file(output_dir, "index.html", index)?;

    let metadata_json = serde_json::to_string_pretty(&SiteMetadata {
        metadata: site.metadata,
        pdf: &pdf_name,
        attachments: &attachments,
    })
    .context("failed to serialize document metadata")?;
    write_site_file(output_dir, "metadata.json", metadata_json)?;

    let jsonld = serde_json::to_string_pretty(&build_jsonld(site.metadata))
        .context("failed to serialize JSON-LD metadata")?;
    write_site_file(output_dir, "metadata.jsonld", jsonld)?;

    info!("Built site with theme `{theme_name}` in {output_dir:?}");
    Ok(())
}

fn write_assets(dir: &Dir<'_>, output_dir: &Path) -> Result<()> {
    for subdir in dir.dirs() {
        let path = output_dir.join(subdir.path());
        create_dir_all(&path).with_context(|| format!("failed to create directory at {path:?}"))?;
        write_assets(subdir, output_dir)?;
    }

    for file in dir.files() {
        let path = output_dir.join(file.path());
        let written = if file.path().extension().is_some_and(|ext| ext == "css") {
            let name = file.path().to_string_lossy();
            let source = file
                .contents_utf8()
                .with_context(|| format!("stylesheet {name} is not valid UTF-8"))?;
            write(&path, minify_css(source, &name)?)
        } else {
            write(&path, file.contents())
        };
        written.with_context(|| format!("failed to write asset to {path:?}"))?;
        debug!("Wrote asset {path:?}");
    }

    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| anyhow!("{path:?} does not end in a UTF-8 file name"))
}

fn copy_to_site(path: &Path, output_dir: &Path, name: &str) -> Result<()> {
    let destination = output_dir.join(name);
    copy(path, &destination)
        .with_context(|| format!("failed to copy {path:?} to {destination:?}"))?;
    Ok(())
}

fn write_site_file(output_dir: &Path, name: &str, contents: String) -> Result<()> {
    let path = output_dir.join(name);
    write(&path, contents).with_context(|| format!("failed to write {path:?}"))
}

#[cfg(test)]
mod test {
    use super::{build_site, BaseTheme, MinimalistTheme, Site, SiteContext, Theme, ThemeRegistry};
    use crate::metadata::{DocumentMetadata, FormattedString};
    use anyhow::Result;
    use include_dir::Dir;
    use serde_json::{json, Value};
    use std::fs::{create_dir, read_to_string, write};
    use tempfile::tempdir;

    static NO_ASSETS: Dir<'static> = Dir::new("", &[]);

    struct Looping;

    impl Theme for Looping {
        fn name(&self) -> &'static str {
            "looping"
        }

        fn base(&self) -> Option<&'static str> {
            Some("looping")
        }

        fn assets(&self) -> &'static Dir<'static> {
            &NO_ASSETS
        }

        fn render_index(&self, _: &SiteContext<'_>) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn registry() {
        let mut registry = ThemeRegistry::with_builtins();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["base", "minimalist"]);

        let chain = registry
            .resolve("minimalist")
            .expect("theme chain should resolve");
        assert_eq!(
            chain.iter().map(|theme| theme.name()).collect::<Vec<_>>(),
            ["base", "minimalist"]
        );
        assert!(registry.resolve("fancy").is_err());

        registry.register(Box::new(Looping));
        assert!(registry.resolve("looping").is_err());
    }

    #[test]
    fn builtins_are_copy() {
        let base = BaseTheme;
        let minimalist = MinimalistTheme;
        let boxed: [Box<dyn Theme>; 2] = [Box::new(base), Box::new(minimalist)];

        assert_eq!(boxed[0].name(), base.name());
        assert_eq!(boxed[1].base(), minimalist.base());
    }

    #[test]
    fn site() {
        let input = tempdir().expect("temporary directory should be created");
        let pdf_path = input.path().join("LDM-151.pdf");
        let table_path = input.path().join("table.csv");
        write(&pdf_path, b"%PDF-1.5").expect("PDF should be written");
        write(&table_path, "a,b\n1,2\n").expect("attachment should be written");

        let mut metadata = DocumentMetadata::new(FormattedString::from_plain("Design"));
        metadata.identifier = Some("LDM-151".to_owned());

        let output = tempdir().expect("temporary directory should be created");
        let output_dir = output.path().join("_build");
        build_site(
            &ThemeRegistry::with_builtins(),
            "minimalist",
            &Site {
                metadata: &metadata,
                pdf_path: &pdf_path,
                attachments: &[table_path],
                output_dir: &output_dir,
            },
        )
        .expect("site should be built");

        for name in ["index.html", "base.css", "minimalist.css", "LDM-151.pdf", "table.csv"] {
            assert!(output_dir.join(name).is_file(), "{name} should be written");
        }

        let index = read_to_string(output_dir.join("index.html")).expect("index should be read");
        assert!(index.contains("<h1>Design</h1>"));
        assert!(index.contains(r#"href="minimalist.css""#));

        let css = read_to_string(output_dir.join("base.css")).expect("stylesheet should be read");
        assert!(!css.contains('\n'), "stylesheet should be minified");

        let metadata_json: Value = serde_json::from_str(
            &read_to_string(output_dir.join("metadata.json")).expect("metadata should be read"),
        )
        .expect("metadata should be JSON");
        assert_eq!(metadata_json["pdf"], json!("LDM-151.pdf"));
        assert_eq!(metadata_json["attachments"], json!(["table.csv"]));
        assert_eq!(metadata_json["identifier"], json!("LDM-151"));

        let jsonld: Value = serde_json::from_str(
            &read_to_string(output_dir.join("metadata.jsonld")).expect("JSON-LD should be read"),
        )
        .expect("JSON-LD should be JSON");
        assert_eq!(jsonld["@id"], json!("LDM-151"));
    }

    #[test]
    fn duplicate_file_names() {
        let input = tempdir().expect("temporary directory should be created");
        let pdf_path = input.path().join("doc.pdf");
        let nested = input.path().join("nested");
        create_dir(&nested).expect("directory should be created");
        let duplicate = nested.join("doc.pdf");
        write(&pdf_path, b"%PDF").expect("PDF should be written");
        write(&duplicate, b"%PDF").expect("duplicate should be written");

        let metadata = DocumentMetadata::new(FormattedString::from_plain("Doc"));
        let output = tempdir().expect("temporary directory should be created");
        let result = build_site(
            &ThemeRegistry::with_builtins(),
            "base",
            &Site {
                metadata: &metadata,
                pdf_path: &pdf_path,
                attachments: &[duplicate],
                output_dir: output.path(),
            },
        );
        assert!(result.is_err());
    }
}
