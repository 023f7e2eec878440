use super::{page::IndexPage, SiteContext, Theme};
use anyhow::Result;
use include_dir::{include_dir, Dir};

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/themes/base");

/// Plain landing page with shared typography. Other themes build on its assets.
#[derive(Clone, Copy, Debug)]
pub struct BaseTheme;

impl Theme for BaseTheme {
    fn name(&self) -> &'static str {
        "base"
    }

    fn assets(&self) -> &'static Dir<'static> {
        &ASSETS
    }

    fn render_index(&self, site: &SiteContext<'_>) -> Result<String> {
        Ok(IndexPage {
            metadata: site.metadata,
            pdf_name: site.pdf_name,
            attachments: site.attachments,
            stylesheets: &["base.css"],
            body_class: "base",
        }
        .render())
    }
}
