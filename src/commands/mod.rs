use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use crate::{api, config::Settings, runtime::Runtime};

mod services;

pub use services::build_upgrade_service;

/// Run the HTTP service until interrupted.
#[tracing::instrument(skip(runtime, settings))]
pub async fn start<R: Runtime + 'static>(runtime: Arc<R>, settings: &Settings) -> Result<()> {
    warn_if_unprivileged(runtime.as_ref());

    let service = Arc::new(build_upgrade_service(runtime.clone(), settings)?);
    if settings.packages.is_empty() {
        warn!("No packages are monitored; every request will be rejected");
    } else {
        info!(
            "Monitoring: {}",
            settings.packages.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    api::serve(service.clone(), runtime.as_ref(), &settings.server).await?;

    // Requests may have gone away while their swap was still running.
    service.wait_for_swaps().await;
    Ok(())
}

/// Print the version report of `package` as JSON.
#[tracing::instrument(skip(runtime, settings))]
pub async fn info<R: Runtime + 'static>(
    runtime: Arc<R>,
    settings: &Settings,
    package: &str,
) -> Result<()> {
    let service = build_upgrade_service(runtime, settings)?;
    let report = service.version_info(package).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Swap `package` to `version` and print the confirmation.
#[tracing::instrument(skip(runtime, settings))]
pub async fn update<R: Runtime + 'static>(
    runtime: Arc<R>,
    settings: &Settings,
    package: &str,
    version: &str,
) -> Result<()> {
    warn_if_unprivileged(runtime.as_ref());

    let service = build_upgrade_service(runtime, settings)?;
    let confirmation = service.update_to_version(package, version).await?;
    println!("{}", confirmation);
    Ok(())
}

fn warn_if_unprivileged<R: Runtime>(runtime: &R) {
    if !runtime.is_privileged() {
        warn!("Not running as root; removing and installing packages will probably fail");
    }
}
