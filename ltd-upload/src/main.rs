mod keeper;
mod upload;

use anyhow::{anyhow, bail, Context, Result};
use common::CiMetadata;
use keeper::Keeper;
use reqwest::Client;
use std::{
    env::{args, var},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use upload::{prescan_directory, upload_dir};

const DEFAULT_LTD_URL: &str = "https://keeper.lsst.codes";

/// Upload settings read from the environment.
struct Settings {
    ltd_url: String,
    product: String,
    username: String,
    password: String,
    git_ref: String,
}

impl Settings {
    fn from_env(ci: &CiMetadata) -> Result<Self> {
        Self::from_vars(|key| var(key).ok(), ci)
    }

    fn from_vars<F>(lookup: F, ci: &CiMetadata) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let required = |keys: &[&str]| {
            keys.iter()
                .find_map(|&key| non_empty(key))
                .ok_or_else(|| anyhow!("`{}` is not set", keys.join("` or `")))
        };

        Ok(Self {
            ltd_url: non_empty("LTD_URL").unwrap_or_else(|| DEFAULT_LTD_URL.to_owned()),
            product: required(&["LTD_PRODUCT"])?,
            username: required(&["LTD_USERNAME", "LTD_KEEPER_USER"])?,
            password: required(&["LTD_PASSWORD", "LTD_KEEPER_PASSWORD"])?,
            git_ref: non_empty("LTD_GIT_REF")
                .or_else(|| ci.git_ref.clone())
                .ok_or_else(|| anyhow!("`LTD_GIT_REF` is not set and no CI git ref was found"))?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = args().skip(1);
    let build_dir = PathBuf::from(
        args.next()
            .ok_or_else(|| anyhow!("site directory path was not provided"))?,
    );
    if args.next().is_some() {
        bail!("too many input arguments were provided");
    }
    if !build_dir.is_dir() {
        bail!("site directory {build_dir:?} does not exist");
    }

    let settings =
        Settings::from_env(&CiMetadata::from_env()).context("failed to read upload settings")?;

    let client = Client::builder()
        .https_only(true)
        .timeout(Duration::from_secs(60))
        .use_rustls_tls()
        .build()
        .context("failed to build HTTP client")?;

    upload(&client, &settings, &build_dir).await
}

async fn upload(client: &Client, settings: &Settings, build_dir: &Path) -> Result<()> {
    let keeper = Keeper::new(client, &settings.ltd_url);
    let token = keeper
        .get_token(&settings.username, &settings.password)
        .await?;

    let directories = prescan_directory(build_dir)?;
    let build = keeper
        .register_build(
            &token,
            &settings.product,
            &[settings.git_ref.clone()],
            &directories,
        )
        .await?;

    upload_dir(client, &build.post_prefix_urls, build_dir).await?;
    keeper.confirm_build(&token, &build).await?;

    info!(
        "Uploaded {build_dir:?} to `{}` for git ref `{}`",
        settings.product, settings.git_ref
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{Settings, DEFAULT_LTD_URL};
    use common::CiMetadata;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)], ci: &CiMetadata) -> anyhow::Result<Settings> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        Settings::from_vars(|key| vars.get(key).map(|value| (*value).to_owned()), ci)
    }

    #[test]
    fn from_vars() {
        let settings = settings(
            &[
                ("LTD_PRODUCT", "ldm-151"),
                ("LTD_KEEPER_USER", "user"),
                ("LTD_PASSWORD", "secret"),
                ("LTD_GIT_REF", "main"),
            ],
            &CiMetadata::default(),
        )
        .expect("settings should be read");

        assert_eq!(settings.ltd_url, DEFAULT_LTD_URL);
        assert_eq!(settings.product, "ldm-151");
        assert_eq!(settings.username, "user");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.git_ref, "main");
    }

    #[test]
    fn git_ref_from_ci() {
        let ci = CiMetadata {
            git_ref: Some("tickets/DM-1".to_owned()),
            ..CiMetadata::default()
        };
        let settings = settings(
            &[
                ("LTD_PRODUCT", "ldm-151"),
                ("LTD_USERNAME", "user"),
                ("LTD_KEEPER_PASSWORD", "secret"),
                ("LTD_URL", "https://keeper.example.org"),
            ],
            &ci,
        )
        .expect("settings should be read");

        assert_eq!(settings.git_ref, "tickets/DM-1");
        assert_eq!(settings.ltd_url, "https://keeper.example.org");
    }

    #[test]
    fn missing_credentials() {
        let Err(error) = settings(
            &[("LTD_PRODUCT", "ldm-151"), ("LTD_GIT_REF", "main")],
            &CiMetadata::default(),
        ) else {
            panic!("settings should be incomplete");
        };

        assert_eq!(
            error.to_string(),
            "`LTD_USERNAME` or `LTD_KEEPER_USER` is not set"
        );
    }
}
