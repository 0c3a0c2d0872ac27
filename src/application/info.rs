//! Info requests: installed version versus the latest release.

use log::{debug, info};
use serde::Serialize;

use crate::error::UpgradeError;
use crate::package::Version;
use crate::runtime::Runtime;

use super::{Resolution, SwapStage, UpgradeService, log_abort, parse_package};

/// Version report for a monitored package.
///
/// Latest fields are blank when the feed has no installable release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub name: String,
    #[serde(rename = "installedversion")]
    pub installed_version: String,
    #[serde(rename = "latestversion")]
    pub latest_version: String,
    #[serde(rename = "downloadurl")]
    pub download_url: String,
    #[serde(rename = "upgradeavailable")]
    pub upgrade_available: bool,
}

impl<R: Runtime> UpgradeService<R> {
    /// Report the installed and latest versions of `package` and whether an
    /// upgrade is available.
    ///
    /// "Latest" is the first installable release in feed order.
    #[tracing::instrument(skip(self))]
    pub async fn version_info(&self, package: &str) -> Result<VersionReport, UpgradeError> {
        self.check(package).await.inspect_err(log_abort)
    }

    async fn check(&self, package: &str) -> Result<VersionReport, UpgradeError> {
        let package = parse_package(package)?;
        let Resolution {
            package,
            installed,
            catalog,
        } = self.resolve(package).await?;

        debug!("{}: {}", package, SwapStage::Comparing);

        let mut report = VersionReport {
            name: package.to_string(),
            installed_version: installed,
            ..Default::default()
        };

        let Some(latest) = catalog.latest() else {
            info!("No installable release found for {}", package);
            return Ok(report);
        };

        let installed_version = parse_version("installed", &report.installed_version)?;
        let latest_version = parse_version("latest", &latest.version)?;

        report.latest_version = latest.version.clone();
        report.download_url = latest.download_url.clone();
        report.upgrade_available = latest_version > installed_version;

        debug!(
            "{}: installed {}, latest {}, upgrade available: {}",
            package, installed_version, latest_version, report.upgrade_available
        );
        Ok(report)
    }
}

pub(super) fn parse_version(subject: &'static str, raw: &str) -> Result<Version, UpgradeError> {
    Version::parse(raw).map_err(|e| UpgradeError::Parse {
        subject,
        version: raw.to_string(),
        reason: e.to_string(),
    })
}
