//! Release feed abstraction.
//!
//! This module provides the interface for fetching installable release
//! candidates for a remote repository, and the GitHub implementation of it.

mod github;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::package::Version;

pub use github::{DEFAULT_API_URL, GitHubFeed};

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    /// Parse a repository URL as written in the settings file.
    ///
    /// Accepts `https://github.com/owner/repo` (with optional `www.`, `http`,
    /// trailing slash or `.git`), `git@github.com:owner/repo.git`, and the bare
    /// `owner/repo` form.
    pub fn from_url(url: &str) -> Result<Self> {
        let trimmed = url.trim();

        let path = if let Some(rest) = trimmed.strip_prefix("git@github.com:") {
            rest
        } else if let Some(rest) = ["https://", "http://"]
            .iter()
            .find_map(|scheme| trimmed.strip_prefix(scheme))
        {
            let rest = rest.strip_prefix("www.").unwrap_or(rest);
            rest.strip_prefix("github.com/")
                .ok_or_else(|| anyhow!("Not a GitHub repository URL: {}", url))?
        } else {
            trimmed
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        path.parse()
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format. Expected 'owner/repo'.")
        } else {
            Ok(RepoId {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}

/// An installable asset of a published release.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ReleaseCandidate {
    /// Release tag (e.g., "v1.3.0")
    pub version: String,
    pub artifact_name: String,
    pub download_url: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Size in bytes as advertised by the feed (0 when unknown)
    pub size: u64,
    /// Content digest as advertised by the feed, e.g. "sha256:<hex>"
    pub digest: Option<String>,
}

/// Candidates in the order the feed returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseCatalog {
    pub candidates: Vec<ReleaseCandidate>,
    /// The feed answered but its payload could not be decoded; `candidates` is empty.
    pub payload_malformed: bool,
}

impl ReleaseCatalog {
    pub fn new(candidates: Vec<ReleaseCandidate>) -> Self {
        Self {
            candidates,
            payload_malformed: false,
        }
    }

    pub fn malformed() -> Self {
        Self {
            candidates: Vec::new(),
            payload_malformed: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The first candidate in feed order.
    ///
    /// The feed lists releases newest first; no version scan is performed.
    pub fn latest(&self) -> Option<&ReleaseCandidate> {
        self.candidates.first()
    }

    /// The first candidate whose tag parses to a version equal to `target`.
    ///
    /// Tags that do not parse are skipped with a warning.
    pub fn find_version(&self, target: &Version) -> Option<&ReleaseCandidate> {
        self.candidates
            .iter()
            .find(|candidate| match Version::parse(&candidate.version) {
                Ok(version) => version == *target,
                Err(e) => {
                    warn!(
                        "Skipping release {} ({}): {}",
                        candidate.version, candidate.artifact_name, e
                    );
                    false
                }
            })
    }
}

/// A remote source of published releases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Fetch the installable candidates of every published release of `repo`.
    async fn list_releases(&self, repo: &RepoId) -> Result<ReleaseCatalog>;
}
