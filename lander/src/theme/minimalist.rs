use super::{page::IndexPage, SiteContext, Theme};
use anyhow::Result;
use include_dir::{include_dir, Dir};

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/themes/minimalist");

#[derive(Clone, Copy, Debug)]
pub struct MinimalistTheme;

impl Theme for MinimalistTheme {
    fn name(&self) -> &'static str {
        "minimalist"
    }

    fn base(&self) -> Option<&'static str> {
        Some("base")
    }

    fn assets(&self) -> &'static Dir<'static> {
        &ASSETS
    }

    fn render_index(&self, site: &SiteContext<'_>) -> Result<String> {
        Ok(IndexPage {
            metadata: site.metadata,
            pdf_name: site.pdf_name,
            attachments: site.attachments,
            stylesheets: &["base.css", "minimalist.css"],
            body_class: "minimalist",
        }
        .render())
    }
}
