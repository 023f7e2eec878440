//! Code for snapshotting a Git repository's tracked files and their last commit times,
//! by running the `git` executable.

use anyhow::{anyhow, bail, Context, Result};
use foldhash::{HashMap, HashMapExt};
use jiff::Timestamp;
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

/// A tracked file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitFile {
    // Relative to the repository root
    pub path: PathBuf,
    // Time of the newest commit that touched the file
    pub date_modified: Timestamp,
}

impl GitFile {
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

#[derive(Clone, Debug)]
pub struct GitRepository {
    pub root: PathBuf,
    pub files: Vec<GitFile>,
}

impl GitRepository {
    /// Snapshots the repository containing `path`.
    ///
    /// # Errors
    /// This function returns an error if:
    /// - `git` cannot be run
    /// - `path` is not inside a Git work tree
    /// - the repository has no commits
    pub fn discover(path: &Path) -> Result<Self> {
        let root = PathBuf::from(
            git(path, &["rev-parse", "--show-toplevel"])
                .context("failed to find Git repository root")?
                .trim(),
        );

        let tracked = git(&root, &["ls-files", "-z"]).context("failed to list tracked files")?;
        let log = git(
            &root,
            &[
                "-c",
                "core.quotePath=false",
                "log",
                "--format=%x00%ct",
                "--name-only",
                "HEAD",
            ],
        )
        .context("failed to read Git history")?;

        let modified = parse_log(&log)?;

        // Files that were deleted or renamed away have history but are no longer tracked
        let files = tracked
            .split('\0')
            .filter(|path| !path.is_empty())
            .filter_map(|path| {
                modified.get(path).map(|&date_modified| GitFile {
                    path: PathBuf::from(path),
                    date_modified,
                })
            })
            .collect::<Vec<_>>();

        debug!("Found {} tracked files in {root:?}", files.len());
        Ok(Self { root, files })
    }

    /// The newest commit time among tracked files with one of the given extensions,
    /// or `None` if no such file exists.
    #[must_use]
    pub fn compute_date_modified(&self, extensions: &[&str]) -> Option<Timestamp> {
        self.files
            .iter()
            .filter(|file| file.extension().is_some_and(|ext| extensions.contains(&ext)))
            .map(|file| file.date_modified)
            .max()
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .context("failed to run `git`")?;

    if !output.status.success() {
        bail!(
            "`git {}` exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    String::from_utf8(output.stdout).context("`git` output is not valid UTF-8")
}

/// Parses the output of `git log --format=%x00%ct --name-only`:
/// one record per commit, newest first, each a Unix timestamp followed by the paths it touched.
/// Returns the newest commit time of every path.
fn parse_log(log: &str) -> Result<HashMap<&str, Timestamp>> {
    let mut modified = HashMap::new();

    for record in log.split('\0').filter(|record| !record.trim().is_empty()) {
        let mut lines = record.lines();
        let seconds = lines
            .next()
            .ok_or_else(|| anyhow!("Git log record is empty"))?
            .trim();
        let timestamp = seconds
            .parse::<i64>()
            .ok()
            .and_then(|seconds| Timestamp::from_second(seconds).ok())
            .with_context(|| format!("invalid commit time {seconds:?} in Git log"))?;

        for path in lines.map(str::trim).filter(|path| !path.is_empty()) {
            modified.entry(path).or_insert(timestamp);
        }
    }

    Ok(modified)
}
