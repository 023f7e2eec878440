use anyhow::{anyhow, Context, Result};
use common::CiMetadata;
use lander::{
    build_site, BibCache, Config, ExtractEnv, GitRepository, PandocConverter, ParserRegistry,
    Site, ThemeRegistry, DEFAULT_CONFIG_FILE,
};
use std::{env::args, path::Path};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: lander build [CONFIG] | lander parsers | lander themes";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let parsers = ParserRegistry::with_builtins();
    let themes = ThemeRegistry::with_builtins();

    let mut args = args().skip(1);
    let command = args.next().ok_or_else(|| anyhow!("{USAGE}"))?;
    let config_path = match command.as_str() {
        "build" => args.next(),
        "parsers" => {
            parsers.names().for_each(|name| println!("{name}"));
            return Ok(());
        }
        "themes" => {
            themes.names().for_each(|name| println!("{name}"));
            return Ok(());
        }
        _ => return Err(anyhow!("unknown command `{command}`\n{USAGE}")),
    };

    if args.next().is_some() {
        return Err(anyhow!("too many input arguments were provided\n{USAGE}"));
    }

    let config_path = config_path.unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_owned());
    let config = Config::from_file(Path::new(&config_path))
        .context("failed to read configuration file")?;
    config.check_names(&parsers, &themes)?;

    build(&config, &parsers, &themes)
}

fn build(config: &Config, parsers: &ParserRegistry, themes: &ThemeRegistry) -> Result<()> {
    let mut bib = BibCache::new();
    if let Some(dir) = &config.bibliography_dir {
        bib.populate_from_dir(dir)
            .context("failed to load bibliographies")?;
    }

    let source_dir = config
        .source_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let git = GitRepository::discover(source_dir)
        .inspect_err(|error| warn!("Revision dates will not come from git: {error:#}"))
        .ok();

    let converter = PandocConverter::new(&config.pandoc);
    let env = ExtractEnv {
        converter: &converter,
        bib: &bib,
        git: git.as_ref(),
    };

    let parser = parsers.get(&config.parser)?;
    let mut metadata = parser.parse(&config.source_path, &env)?;
    info!("Extracted metadata for {:?}", metadata.title.plain);

    let ci = CiMetadata::from_env();
    if ci.build_url.is_some() {
        metadata.ci_url = ci.build_url.clone();
    }
    if metadata.repository_url.is_none() {
        metadata.repository_url = ci.github_repository();
    }
    if config.canonical_url.is_some() {
        metadata.canonical_url.clone_from(&config.canonical_url);
    }
    let metadata = config
        .metadata
        .apply(metadata)
        .context("failed to apply configured metadata")?;

    let attachments = config.attachment_paths()?;
    build_site(
        themes,
        &config.theme,
        &Site {
            metadata: &metadata,
            pdf_path: &config.pdf_path,
            attachments: &attachments,
            output_dir: &config.output_dir,
        },
    )
}
