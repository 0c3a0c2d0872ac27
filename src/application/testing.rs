//! Test doubles for the upgrade service.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::UpgradeService;
use crate::config::PackageRegistry;
use crate::download::MockRetriever;
use crate::package::{MockPackageDatabase, PackageDatabase, PackageName};
use crate::provider::{MockReleaseFeed, ReleaseCandidate, ReleaseCatalog};
use crate::runtime::MockRuntime;

pub const REPOSITORY: &str = "https://github.com/danesparza/daydash";

pub fn download_url(tag: &str) -> String {
    format!("{}/releases/download/{}/daydash_{}_armhf.deb", REPOSITORY, tag, tag)
}

/// A catalog listing one `.deb` candidate per tag, in the given order.
pub fn catalog(tags: &[&str]) -> ReleaseCatalog {
    ReleaseCatalog::new(
        tags.iter()
            .map(|tag| ReleaseCandidate {
                version: tag.to_string(),
                artifact_name: format!("daydash_{}_armhf.deb", tag),
                download_url: download_url(tag),
                ..Default::default()
            })
            .collect(),
    )
}

/// Mocks for every collaborator, with `daydash` monitored.
pub struct Fixture {
    pub runtime: MockRuntime,
    pub feed: MockReleaseFeed,
    pub database: MockPackageDatabase,
    pub retriever: MockRetriever,
    repository: String,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            runtime: MockRuntime::new(),
            feed: MockReleaseFeed::new(),
            database: MockPackageDatabase::new(),
            retriever: MockRetriever::new(),
            repository: REPOSITORY.to_string(),
        }
    }

    pub fn repository(mut self, url: &str) -> Self {
        self.repository = url.to_string();
        self
    }

    pub fn installed(mut self, version: &str) -> Self {
        let version = version.to_string();
        self.database
            .expect_installed_version()
            .returning(move |_| Ok(version.clone()));
        self
    }

    pub fn probe_error(mut self, message: &str) -> Self {
        let message = message.to_string();
        self.database
            .expect_installed_version()
            .returning(move |_| Err(anyhow!(message.clone())));
        self
    }

    pub fn catalog(mut self, catalog: ReleaseCatalog) -> Self {
        self.feed
            .expect_list_releases()
            .returning(move |_| Ok(catalog.clone()));
        self
    }

    pub fn fetch_error(mut self, message: &str) -> Self {
        let message = message.to_string();
        self.feed
            .expect_list_releases()
            .returning(move |_| Err(anyhow!(message.clone())));
        self
    }

    pub fn build(self) -> UpgradeService<MockRuntime> {
        let Fixture {
            runtime,
            feed,
            database,
            retriever,
            repository,
        } = self;
        assemble(runtime, feed, Arc::new(database), retriever, repository)
    }

    /// Build with a hand-written database in place of the mock.
    pub fn build_with_database(
        self,
        database: Arc<dyn PackageDatabase>,
    ) -> UpgradeService<MockRuntime> {
        assemble(self.runtime, self.feed, database, self.retriever, self.repository)
    }
}

fn assemble(
    runtime: MockRuntime,
    feed: MockReleaseFeed,
    database: Arc<dyn PackageDatabase>,
    retriever: MockRetriever,
    repository: String,
) -> UpgradeService<MockRuntime> {
    let registry = PackageRegistry::new(vec![("daydash".to_string(), repository)]);
    UpgradeService::new(
        Arc::new(runtime),
        Arc::new(registry),
        Arc::new(feed),
        database,
        Arc::new(retriever),
    )
}

/// A package database whose probe never finishes in time.
pub struct SlowDatabase;

#[async_trait]
impl PackageDatabase for SlowDatabase {
    async fn installed_version(&self, _package: &PackageName) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok("1.2.0".to_string())
    }

    async fn remove(&self, _package: &PackageName) -> Result<String> {
        Ok(String::new())
    }

    async fn install(&self, _artifact: &Path) -> Result<String> {
        Ok(String::new())
    }
}

/// A package database that records how many swaps overlap.
#[derive(Default)]
pub struct CountingDatabase {
    active: AtomicUsize,
    max_active: AtomicUsize,
    completed: AtomicUsize,
    install_delay: Option<Duration>,
}

impl CountingDatabase {
    pub fn stalling_install() -> Self {
        Self::slow_install(Duration::from_secs(10))
    }

    pub fn slow_install(delay: Duration) -> Self {
        Self {
            install_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn swaps(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageDatabase for CountingDatabase {
    async fn installed_version(&self, _package: &PackageName) -> Result<String> {
        Ok("1.2.0".to_string())
    }

    async fn remove(&self, _package: &PackageName) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(String::new())
    }

    async fn install(&self, _artifact: &Path) -> Result<String> {
        tokio::time::sleep(self.install_delay.unwrap_or(Duration::from_millis(20))).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }
}
