//! Application layer - the package swap orchestrator.
//!
//! A request moves through these stages:
//!
//! ```text
//! Idle -> Probing -> Fetching -> Comparing -> NoUpdateNeeded
//!                                          -> Downloading -> Removing -> Installing -> Done
//! ```
//!
//! Any stage may abort. An info request ends at `Comparing`. Nothing is
//! mutated before `Removing`; once removal has succeeded an install failure
//! leaves the package absent and is reported as such. There is no rollback.

mod info;
mod update;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, error, warn};
use tokio::sync::Mutex;

use crate::config::PackageRegistry;
use crate::download::Retriever;
use crate::error::{UpgradeError, reason};
use crate::package::{PackageDatabase, PackageName};
use crate::provider::{ReleaseCatalog, ReleaseFeed, RepoId};
use crate::runtime::Runtime;

pub use info::VersionReport;

/// Stages of a request that perform I/O or make a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    Probing,
    Fetching,
    Comparing,
    Downloading,
    Removing,
    Installing,
}

impl SwapStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStage::Probing => "probing",
            SwapStage::Fetching => "fetching",
            SwapStage::Comparing => "comparing",
            SwapStage::Downloading => "downloading",
            SwapStage::Removing => "removing",
            SwapStage::Installing => "installing",
        }
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What probing and fetching found out about a monitored package.
struct Resolution {
    package: PackageName,
    installed: String,
    catalog: ReleaseCatalog,
}

pub struct UpgradeService<R: Runtime> {
    runtime: Arc<R>,
    registry: Arc<PackageRegistry>,
    feed: Arc<dyn ReleaseFeed>,
    database: Arc<dyn PackageDatabase>,
    retriever: Arc<dyn Retriever>,
    swap_locks: DashMap<String, Arc<Mutex<()>>>,
    step_timeout: Option<Duration>,
}

impl<R: Runtime> UpgradeService<R> {
    pub fn new(
        runtime: Arc<R>,
        registry: Arc<PackageRegistry>,
        feed: Arc<dyn ReleaseFeed>,
        database: Arc<dyn PackageDatabase>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            runtime,
            registry,
            feed,
            database,
            retriever,
            swap_locks: DashMap::new(),
            step_timeout: None,
        }
    }

    /// Deadline applied to each probe, fetch, download, remove and install.
    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Probing and Fetching, shared by info and update requests.
    async fn resolve(&self, package: PackageName) -> Result<Resolution, UpgradeError> {
        let url = self
            .registry
            .lookup(&package)
            .ok_or_else(|| UpgradeError::NotMonitored {
                package: package.to_string(),
            })?
            .to_string();

        let installed = self
            .step(
                &package,
                SwapStage::Probing,
                self.database.installed_version(&package),
                |reason| UpgradeError::Probe {
                    package: package.to_string(),
                    reason,
                },
            )
            .await?;

        let repo = RepoId::from_url(&url).map_err(|_| UpgradeError::InvalidRepository {
            package: package.to_string(),
            url: url.clone(),
        })?;

        let catalog = self
            .step(
                &package,
                SwapStage::Fetching,
                self.feed.list_releases(&repo),
                |reason| UpgradeError::Fetch {
                    repo: repo.to_string(),
                    reason,
                },
            )
            .await?;

        if catalog.payload_malformed {
            warn!(
                "Release feed for {} returned an undecodable payload; continuing with no releases",
                repo
            );
        }

        Ok(Resolution {
            package,
            installed,
            catalog,
        })
    }

    /// Run one I/O stage under the step deadline, tagging its failure with `fail`.
    async fn step<T, F>(
        &self,
        package: &PackageName,
        stage: SwapStage,
        work: F,
        fail: impl FnOnce(String) -> UpgradeError,
    ) -> Result<T, UpgradeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        run_step(self.step_timeout, package, stage, work, fail).await
    }

    /// Lock serializing remove and install for one package.
    fn swap_lock(&self, package: &PackageName) -> Arc<Mutex<()>> {
        self.swap_locks
            .entry(package.to_string())
            .or_default()
            .clone()
    }

    /// Wait until every swap that has started has finished.
    pub async fn wait_for_swaps(&self) {
        let locks: Vec<_> = self
            .swap_locks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for lock in locks {
            drop(lock.lock().await);
        }
    }
}

/// Run one I/O stage under `limit`, tagging its failure with `fail`.
///
/// Running out of time while installing is an install failure: the old
/// package is gone by then.
async fn run_step<T, F>(
    limit: Option<Duration>,
    package: &PackageName,
    stage: SwapStage,
    work: F,
    fail: impl FnOnce(String) -> UpgradeError,
) -> Result<T, UpgradeError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    debug!("{}: {}", package, stage);

    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(outcome) => outcome,
            Err(_) if stage == SwapStage::Installing => {
                return Err(fail(format!("{} step timed out after {:?}", stage, limit)));
            }
            Err(_) => {
                return Err(UpgradeError::Timeout {
                    package: package.to_string(),
                    stage: stage.as_str(),
                    limit,
                });
            }
        },
        None => work.await,
    };

    outcome.map_err(|e| fail(reason(&e)))
}

/// Log an aborted request. Caller mistakes are warnings, everything else is an error.
fn log_abort(err: &UpgradeError) {
    match err {
        UpgradeError::InvalidInput(_)
        | UpgradeError::NotMonitored { .. }
        | UpgradeError::VersionNotFound { .. } => warn!("Aborted: {}", err),
        _ if err.is_package_absent() => {
            error!("Aborted with the package removed, install it by hand: {}", err)
        }
        _ => error!("Aborted: {}", err),
    }
}

fn parse_package(package: &str) -> Result<PackageName, UpgradeError> {
    package
        .parse()
        .map_err(|e: anyhow::Error| UpgradeError::InvalidInput(e.to_string()))
}

#[cfg(test)]
pub(crate) mod testing;
