//! Code for uploading a site directory through presigned POST URLs.

use crate::keeper::{checked, PresignedPost};
use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use std::{collections::BTreeMap, path::Path};
use tokio::fs::read;
use tracing::{debug, info};
use walkdir::WalkDir;

/// A file to upload and the directory prefix it is uploaded under.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SiteFile {
    pub(crate) path: Utf8PathBuf,
    pub(crate) prefix: String,
    pub(crate) file_name: String,
}

/// Lists the directory prefixes of a site: `/` for the root, then every
/// sub-directory relative to the root with a trailing `/`.
pub(crate) fn prescan_directory(base_dir: &Path) -> Result<Vec<String>> {
    let mut prefixes = vec!["/".to_owned()];

    for entry in WalkDir::new(base_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.context("failed to read site directory entry")?;
        if entry.file_type().is_dir() {
            prefixes.push(prefix_for(base_dir, entry.path())?);
        }
    }

    Ok(prefixes)
}

/// Lists the files of a site with the directory prefix each one belongs to.
pub(crate) fn collect_files(base_dir: &Path) -> Result<Vec<SiteFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(base_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.context("failed to read site directory entry")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::try_from(entry.path().to_path_buf())
            .with_context(|| format!("{:?} is not a UTF-8 path", entry.path()))?;
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("{path} has no parent directory"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{path} has no file name"))?
            .to_owned();

        files.push(SiteFile {
            prefix: prefix_for(base_dir, parent.as_std_path())?,
            file_name,
            path,
        });
    }

    Ok(files)
}

fn prefix_for(base_dir: &Path, dir: &Path) -> Result<String> {
    let relative = dir
        .strip_prefix(base_dir)
        .with_context(|| format!("{dir:?} is outside of {base_dir:?}"))?;
    let relative = Utf8Path::from_path(relative)
        .ok_or_else(|| anyhow!("{relative:?} is not a UTF-8 path"))?;

    let components: Vec<&str> = relative
        .components()
        .map(|component| component.as_str())
        .collect();
    Ok(if components.is_empty() {
        "/".to_owned()
    } else {
        format!("{}/", components.join("/"))
    })
}

/// Guesses the media type of a site file from its extension.
pub(crate) fn content_type(path: &Utf8Path) -> &'static str {
    match path.extension().map(str::to_ascii_lowercase).as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("jsonld") => "application/ld+json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("csv") => "text/csv; charset=utf-8",
        Some("txt" | "tex" | "bib") => "text/plain; charset=utf-8",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Uploads every file in the site to the presigned POST of its directory.
pub(crate) async fn upload_dir(
    client: &Client,
    posts: &BTreeMap<String, PresignedPost>,
    base_dir: &Path,
) -> Result<()> {
    let files = collect_files(base_dir)?;

    for file in &files {
        let post = posts
            .get(&file.prefix)
            .ok_or_else(|| anyhow!("no upload URL was issued for directory {}", file.prefix))?;
        upload_file(client, post, file)
            .await
            .with_context(|| format!("failed to upload {}", file.path))?;
    }

    info!("Uploaded {} files", files.len());
    Ok(())
}

async fn upload_file(client: &Client, post: &PresignedPost, file: &SiteFile) -> Result<()> {
    let contents = read(&file.path)
        .await
        .context("failed to read file")?;

    let form = post
        .fields
        .iter()
        .fold(Form::new(), |form, (name, value)| {
            form.text(name.clone(), value.clone())
        })
        // The file must be the last field of the form
        .part(
            "file",
            Part::bytes(contents)
                .file_name(file.file_name.clone())
                .mime_str(content_type(&file.path))?,
        );

    let response = client
        .post(&post.url)
        .multipart(form)
        .send()
        .await
        .context("failed to send upload request")?;
    checked(response).await?;

    debug!("Uploaded {} under {}", file.path, file.prefix);
    Ok(())
}
