//! The local package database, driven through `dpkg-query` and `dpkg`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::debug;

use super::PackageName;
use crate::runtime::{CommandOutput, Runtime};

pub const DEFAULT_QUERY_COMMAND: &str = "dpkg-query";
pub const DEFAULT_MANAGER_COMMAND: &str = "dpkg";

/// Query and mutation operations on the local package database.
///
/// Each call is a single synchronous invocation of the underlying tool; none retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageDatabase: Send + Sync {
    /// Installed version of `package`, trimmed.
    ///
    /// An empty string means the database knows the name but reports no version.
    async fn installed_version(&self, package: &PackageName) -> Result<String>;

    /// Uninstall `package`. Returns the tool's combined output.
    async fn remove(&self, package: &PackageName) -> Result<String>;

    /// Install the package archive at `artifact`. Returns the tool's combined output.
    async fn install(&self, artifact: &Path) -> Result<String>;
}

pub struct Dpkg<R: Runtime> {
    runtime: Arc<R>,
    query_command: String,
    manager_command: String,
}

impl<R: Runtime> Dpkg<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self::with_commands(runtime, DEFAULT_QUERY_COMMAND, DEFAULT_MANAGER_COMMAND)
    }

    pub fn with_commands(runtime: Arc<R>, query_command: &str, manager_command: &str) -> Self {
        Self {
            runtime,
            query_command: query_command.to_string(),
            manager_command: manager_command.to_string(),
        }
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.runtime.run_command(program, &args).await?;
        if !output.success() {
            let status = output
                .code
                .map(|c| format!("exit status {}", c))
                .unwrap_or_else(|| "terminated by signal".to_string());
            let detail = output.combined();
            if detail.is_empty() {
                bail!("{} failed ({})", program, status);
            }
            bail!("{} failed ({}): {}", program, status, detail);
        }
        Ok(output)
    }
}

#[async_trait]
impl<R: Runtime> PackageDatabase for Dpkg<R> {
    #[tracing::instrument(skip(self))]
    async fn installed_version(&self, package: &PackageName) -> Result<String> {
        debug!("Querying installed version of {}", package);

        let output = self
            .run(
                &self.query_command,
                vec![
                    "--showformat".into(),
                    "${Version}".into(),
                    "--show".into(),
                    package.to_string(),
                ],
            )
            .await?;

        let version = output.stdout.trim().to_string();
        debug!("Found installed version '{}' for {}", version, package);
        Ok(version)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, package: &PackageName) -> Result<String> {
        let output = self
            .run(
                &self.manager_command,
                vec!["--remove".into(), package.to_string()],
            )
            .await?;
        Ok(output.combined())
    }

    #[tracing::instrument(skip(self))]
    async fn install(&self, artifact: &Path) -> Result<String> {
        let output = self
            .run(
                &self.manager_command,
                vec!["--install".into(), artifact.display().to_string()],
            )
            .await?;
        Ok(output.combined())
    }
}
