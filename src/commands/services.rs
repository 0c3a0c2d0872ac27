//! Service factory: builds the upgrade service and its collaborators from settings.

use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::{
    application::UpgradeService,
    config::Settings,
    download::HttpRetriever,
    http::HttpClient,
    package::Dpkg,
    provider::GitHubFeed,
    runtime::Runtime,
};

pub fn build_upgrade_service<R: Runtime + 'static>(
    runtime: Arc<R>,
    settings: &Settings,
) -> Result<UpgradeService<R>> {
    let http_client = HttpClient::with_user_agent()?;

    let feed = GitHubFeed::from_http_client(http_client.clone(), &settings.github.api_url)
        .strict_decode(settings.github.strict_decode);
    let database = Dpkg::with_commands(
        runtime.clone(),
        &settings.package_database.query_command,
        &settings.package_database.manager_command,
    );
    let retriever = HttpRetriever::new(runtime.clone(), http_client);
    let registry = settings.registry();

    debug!(
        "Monitoring {} package(s) against {}",
        registry.len(),
        feed.api_url()
    );

    Ok(UpgradeService::new(
        runtime,
        Arc::new(registry),
        Arc::new(feed),
        Arc::new(database),
        Arc::new(retriever),
    )
    .with_step_timeout(settings.swap.step_timeout()))
}
