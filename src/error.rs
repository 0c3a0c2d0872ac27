//! Error taxonomy for the upgrade flow.
//!
//! Lower layers report failures as `anyhow::Error`; the orchestrator tags each
//! one with the stage it happened in so callers can tell local faults from
//! upstream faults from bad requests.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("not monitoring the package {package}")]
    NotMonitored { package: String },

    #[error("invalid repository url for package {package}: {url}")]
    InvalidRepository { package: String, url: String },

    #[error("problem getting current version for package {package}: {reason}")]
    Probe { package: String, reason: String },

    #[error("problem getting versions for repo {repo}: {reason}")]
    Fetch { repo: String, reason: String },

    #[error("failed to parse {subject} version '{version}': {reason}")]
    Parse {
        subject: &'static str,
        version: String,
        reason: String,
    },

    #[error("problem downloading the package file {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("problem removing the package {package}: {reason}")]
    Remove { package: String, reason: String },

    #[error(
        "problem installing {artifact} for package {package}: {reason}. \
         The previous version was already removed; the package is not installed"
    )]
    Install {
        package: String,
        artifact: String,
        reason: String,
    },

    #[error("version {version} of package {package} was not found in the release feed")]
    VersionNotFound { package: String, version: String },

    /// A stage other than installing ran past its deadline. An install that
    /// runs out of time is reported as [`UpgradeError::Install`].
    #[error("{stage} step for package {package} timed out after {limit:?}")]
    Timeout {
        package: String,
        stage: &'static str,
        limit: Duration,
    },

    #[error(
        "swap of package {package} stopped before it finished; \
         the package may not be installed"
    )]
    Interrupted { package: String },
}

impl UpgradeError {
    /// HTTP status reflecting whether the fault is the request's, upstream's or ours.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UpgradeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            UpgradeError::NotMonitored { .. } | UpgradeError::VersionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            UpgradeError::InvalidRepository { .. } | UpgradeError::Fetch { .. } => {
                StatusCode::FAILED_DEPENDENCY
            }
            UpgradeError::Probe { .. }
            | UpgradeError::Parse { .. }
            | UpgradeError::Download { .. }
            | UpgradeError::Remove { .. }
            | UpgradeError::Install { .. }
            | UpgradeError::Timeout { .. }
            | UpgradeError::Interrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the old package was removed and the new one did not install.
    pub fn is_package_absent(&self) -> bool {
        matches!(self, UpgradeError::Install { .. })
    }
}

/// Render an error with its full context chain on one line.
pub(crate) fn reason(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
