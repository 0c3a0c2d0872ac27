//! Update requests: swap the installed package for a given release.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::download::ArtifactCheck;
use crate::error::UpgradeError;
use crate::package::{PackageDatabase, PackageName, Version};
use crate::runtime::Runtime;

use super::info::parse_version;
use super::{Resolution, SwapStage, UpgradeService, log_abort, parse_package, run_step};

impl<R: Runtime + 'static> UpgradeService<R> {
    /// Replace the installed `package` with release `version`.
    ///
    /// The old package is removed before the new one is installed. If the
    /// install fails the package is left absent and the downloaded artifact
    /// stays on disk; the error says so. Once the download is done the swap
    /// runs on its own task and finishes even if the caller stops waiting.
    #[tracing::instrument(skip(self))]
    pub async fn update_to_version(
        &self,
        package: &str,
        version: &str,
    ) -> Result<String, UpgradeError> {
        let swap = self.prepare(package, version).await.inspect_err(log_abort)?;
        let package = swap.package.to_string();

        match tokio::spawn(swap.run().in_current_span()).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {
                let err = UpgradeError::Interrupted { package };
                log_abort(&err);
                Err(err)
            }
        }
    }

    /// Everything up to and including Downloading. Nothing is mutated here.
    async fn prepare(&self, package: &str, version: &str) -> Result<Swap<R>, UpgradeError> {
        let package = parse_package(package)?;
        let target = parse_target(version)?;

        let Resolution {
            package,
            installed,
            catalog,
        } = self.resolve(package).await?;

        debug!("{}: {}", package, SwapStage::Comparing);
        let candidate = catalog
            .find_version(&target)
            .ok_or_else(|| UpgradeError::VersionNotFound {
                package: package.to_string(),
                version: target.to_string(),
            })?
            .clone();

        if parse_version("installed", &installed).is_ok_and(|current| current == target) {
            info!("{} {} is already installed, reinstalling", package, installed);
        }
        info!(
            "Upgrading {} from '{}' to {} ({})",
            package, installed, candidate.version, candidate.artifact_name
        );

        let artifact = self
            .step(
                &package,
                SwapStage::Downloading,
                self.retriever.download(
                    &candidate.download_url,
                    &ArtifactCheck::for_candidate(&candidate),
                ),
                |reason| UpgradeError::Download {
                    url: candidate.download_url.clone(),
                    reason,
                },
            )
            .await?;

        Ok(Swap {
            runtime: self.runtime.clone(),
            database: self.database.clone(),
            lock: self.swap_lock(&package),
            step_timeout: self.step_timeout,
            package,
            target,
            artifact,
        })
    }
}

/// A downloaded release waiting to replace the installed package.
struct Swap<R: Runtime> {
    runtime: Arc<R>,
    database: Arc<dyn PackageDatabase>,
    lock: Arc<Mutex<()>>,
    step_timeout: Option<Duration>,
    package: PackageName,
    target: Version,
    artifact: PathBuf,
}

impl<R: Runtime> Swap<R> {
    /// Removing and Installing, under the package's swap lock.
    async fn run(self) -> Result<String, UpgradeError> {
        let _guard = self.lock.lock().await;

        self.replace().await.inspect_err(log_abort)?;

        self.discard_artifact();
        info!("Installed {} version {}", self.package, self.target);
        Ok(format!("Installed {} version {}", self.package, self.target))
    }

    async fn replace(&self) -> Result<(), UpgradeError> {
        let package = &self.package;
        let artifact = &self.artifact;

        let removal = run_step(
            self.step_timeout,
            package,
            SwapStage::Removing,
            self.database.remove(package),
            |reason| UpgradeError::Remove {
                package: package.to_string(),
                reason,
            },
        )
        .await;
        match removal {
            Ok(output) => debug!("{}", output),
            Err(err) => {
                self.discard_artifact();
                return Err(err);
            }
        }

        let output = run_step(
            self.step_timeout,
            package,
            SwapStage::Installing,
            self.database.install(artifact),
            |reason| UpgradeError::Install {
                package: package.to_string(),
                artifact: artifact.display().to_string(),
                reason,
            },
        )
        .await?;
        debug!("{}", output);
        Ok(())
    }

    fn discard_artifact(&self) {
        if let Err(e) = self.runtime.remove_file(&self.artifact) {
            warn!(
                "Failed to remove downloaded artifact {:?}: {}",
                self.artifact, e
            );
        }
    }
}

fn parse_target(version: &str) -> Result<Version, UpgradeError> {
    let version = version.trim();
    if version.is_empty() {
        return Err(UpgradeError::InvalidInput(
            "version is a required parameter and should not be blank".to_string(),
        ));
    }
    Version::parse(version).map_err(|e| {
        UpgradeError::InvalidInput(format!("invalid version '{}': {}", version, e))
    })
}
