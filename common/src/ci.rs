//! Code for reading build metadata from the environment variables set by CI platforms.

use std::{env::var, fmt};

/// The CI platform a build runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CiPlatform {
    /// The build is not performed through a recognized CI platform.
    #[default]
    Null,
    GithubActions,
    Travis,
}

impl fmt::Display for CiPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::GithubActions => "github_actions",
            Self::Travis => "travis",
        })
    }
}

/// Whether a git ref names a branch or a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GitRefType {
    Branch,
    Tag,
}

impl fmt::Display for GitRefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CiMetadata {
    pub platform: CiPlatform,
    // Branch or tag name
    pub git_ref: Option<String>,
    pub git_ref_type: Option<GitRefType>,
    pub git_sha: Option<String>,
    pub build_id: Option<String>,
    // Dashboard URL for this build
    pub build_url: Option<String>,
    // Repository slug in `org/repo` form
    pub github_slug: Option<String>,
}

impl CiMetadata {
    /// Gathers CI metadata from the process environment, inferring the CI platform.
    /// If no platform can be inferred, empty metadata is returned.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| var(key).ok())
    }

    /// Gathers CI metadata through an arbitrary variable lookup.
    /// `lookup` returns `None` for unset variables.
    #[must_use]
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("GITHUB_ACTIONS").is_some_and(|v| !v.is_empty()) {
            Self::for_github_actions(&lookup)
        } else if lookup("TRAVIS").as_deref() == Some("true") {
            Self::for_travis(&lookup)
        } else {
            Self::default()
        }
    }

    /// URL of the GitHub repository homepage, if the repository slug is known.
    #[must_use]
    pub fn github_repository(&self) -> Option<String> {
        self.github_slug
            .as_deref()
            .filter(|slug| !slug.is_empty())
            .map(|slug| format!("https://github.com/{slug}"))
    }

    fn for_github_actions<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let run_id = lookup("GITHUB_RUN_ID");
        let repo = lookup("GITHUB_REPOSITORY");

        let build_url = match (&repo, &run_id) {
            (Some(repo), Some(run_id)) => {
                Some(format!("https://github.com/{repo}/actions/runs/{run_id}"))
            }
            _ => None,
        };

        let (git_ref, git_ref_type) = lookup("GITHUB_REF")
            .as_deref()
            .and_then(parse_github_ref)
            .map_or((None, None), |(name, kind)| (Some(name), kind));

        Self {
            platform: CiPlatform::GithubActions,
            git_ref,
            git_ref_type,
            git_sha: lookup("GITHUB_SHA"),
            build_id: run_id,
            build_url,
            github_slug: repo,
        }
    }

    fn for_travis<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (git_ref, git_ref_type) = if let Some(tag) = lookup("TRAVIS_TAG").filter(|t| !t.is_empty())
        {
            (Some(tag), Some(GitRefType::Tag))
        } else if let Some(branch) = lookup("TRAVIS_BRANCH").filter(|b| !b.is_empty()) {
            (Some(branch), Some(GitRefType::Branch))
        } else {
            (None, None)
        };

        Self {
            platform: CiPlatform::Travis,
            git_ref,
            git_ref_type,
            git_sha: lookup("TRAVIS_COMMIT"),
            build_id: lookup("TRAVIS_BUILD_NUMBER"),
            build_url: lookup("TRAVIS_BUILD_WEB_URL"),
            github_slug: lookup("TRAVIS_REPO_SLUG"),
        }
    }
}

/// Splits a `GITHUB_REF` value like `refs/heads/main` into the ref name and its type.
/// Pull request refs keep their name but have no type.
fn parse_github_ref(github_ref: &str) -> Option<(String, Option<GitRefType>)> {
    let rest = github_ref.strip_prefix("refs/")?;
    let (kind, name) = rest.split_once('/')?;
    if name.is_empty() {
        return None;
    }

    let kind = match kind {
        "heads" => Some(GitRefType::Branch),
        "tags" => Some(GitRefType::Tag),
        "pull" => None,
        _ => return None,
    };

    Some((name.to_owned(), kind))
}
