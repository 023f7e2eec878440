//! Client for the LTD Keeper REST API.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct NewBuild<'a> {
    git_refs: &'a [String],
    directories: &'a [String],
}

/// A build registered with Keeper that is waiting for its files.
#[derive(Debug, Deserialize)]
pub(crate) struct BuildResource {
    pub(crate) self_url: String,
    // Presigned POST targets keyed by directory prefix (`/`, `tables/`, ...)
    pub(crate) post_prefix_urls: BTreeMap<String, PresignedPost>,
}

/// An S3 presigned POST: the form fields must be sent alongside the file.
#[derive(Debug, Deserialize)]
pub(crate) struct PresignedPost {
    pub(crate) url: String,
    pub(crate) fields: BTreeMap<String, String>,
}

pub(crate) struct Keeper<'c> {
    client: &'c Client,
    base_url: String,
}

impl<'c> Keeper<'c> {
    pub(crate) fn new(client: &'c Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Exchanges user credentials for an API token.
    pub(crate) async fn get_token(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/token", self.base_url))
            .basic_auth(username, Some(password))
            .send()
            .await
            .context("failed to request Keeper token")?;

        let token: TokenResponse = checked(response)
            .await
            .context("Keeper refused the credentials")?
            .json()
            .await
            .context("failed to parse Keeper token response")?;

        debug!("Obtained Keeper token");
        Ok(token.token)
    }

    /// Registers a new build of a product.
    pub(crate) async fn register_build(
        &self,
        token: &str,
        product: &str,
        git_refs: &[String],
        directories: &[String],
    ) -> Result<BuildResource> {
        let response = self
            .client
            .post(format!("{}/products/{product}/builds/", self.base_url))
            .basic_auth(token, Some(""))
            .json(&NewBuild {
                git_refs,
                directories,
            })
            .send()
            .await
            .context("failed to request build registration")?;

        let build: BuildResource = checked(response)
            .await
            .with_context(|| format!("Keeper refused to register a build of `{product}`"))?
            .json()
            .await
            .context("failed to parse Keeper build resource")?;

        info!("Registered build {}", build.self_url);
        Ok(build)
    }

    /// Marks a build's upload as complete.
    pub(crate) async fn confirm_build(&self, token: &str, build: &BuildResource) -> Result<()> {
        let response = self
            .client
            .patch(&build.self_url)
            .basic_auth(token, Some(""))
            .json(&json!({ "uploaded": true }))
            .send()
            .await
            .context("failed to request build confirmation")?;

        checked(response)
            .await
            .context("Keeper refused to confirm the build")?;

        info!("Confirmed build {}", build.self_url);
        Ok(())
    }
}

// Turns an unsuccessful response into an error that carries the response body
pub(crate) async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("server responded with {status}: {}", body.trim()))
}
