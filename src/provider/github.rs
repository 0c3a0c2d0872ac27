//! GitHub release feed.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
#[cfg(test)]
use reqwest::Client;

use crate::http::HttpClient;
use crate::package::NATIVE_PACKAGE_EXTENSION;

use super::{ReleaseCandidate, ReleaseCatalog, ReleaseFeed, RepoId};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub API response types (internal).
mod api {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        pub tag_name: String,
        #[serde(default)]
        pub assets: Vec<Asset>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Asset {
        pub name: String,
        pub browser_download_url: String,
        pub created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub size: u64,
        #[serde(default)]
        pub digest: Option<String>,
    }
}

/// Release feed backed by the GitHub REST API.
pub struct GitHubFeed {
    http_client: HttpClient,
    api_url: String,
    strict_decode: bool,
}

impl GitHubFeed {
    /// Create a new GitHub feed with custom API URL.
    /// Used primarily for testing.
    #[cfg(test)]
    pub fn with_api_url(client: Client, api_url: &str) -> Self {
        Self::from_http_client(HttpClient::new(client), api_url)
    }

    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, api_url: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            strict_decode: false,
        }
    }

    /// API base URL, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Treat an undecodable release payload as an error instead of an empty catalog.
    pub fn strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }
}

#[async_trait]
impl ReleaseFeed for GitHubFeed {
    #[tracing::instrument(skip(self))]
    async fn list_releases(&self, repo: &RepoId) -> Result<ReleaseCatalog> {
        let url = format!("{}/repos/{}/{}/releases", self.api_url, repo.owner, repo.repo);
        debug!("Fetching releases from {}...", url);

        let body = self.http_client.get_bytes(&url).await?;

        let releases: Vec<api::Release> = match serde_json::from_slice(&body) {
            Ok(releases) => releases,
            Err(e) if self.strict_decode => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Undecodable release payload from {}", url)));
            }
            Err(e) => {
                warn!(
                    "Release payload from {} could not be decoded ({}); treating it as zero releases",
                    url, e
                );
                return Ok(ReleaseCatalog::malformed());
            }
        };

        let catalog = ReleaseCatalog::new(collect_candidates(releases));
        debug!(
            "Found {} installable candidate(s) for {}",
            catalog.candidates.len(),
            repo
        );
        Ok(catalog)
    }
}

/// Flatten releases into candidates, keeping only installable assets, in payload order.
fn collect_candidates(releases: Vec<api::Release>) -> Vec<ReleaseCandidate> {
    releases
        .into_iter()
        .flat_map(|release| {
            let tag = release.tag_name;
            release
                .assets
                .into_iter()
                .filter(|asset| asset.name.ends_with(NATIVE_PACKAGE_EXTENSION))
                .map(move |asset| ReleaseCandidate {
                    version: tag.clone(),
                    artifact_name: asset.name,
                    download_url: asset.browser_download_url,
                    published_at: asset.created_at,
                    size: asset.size,
                    digest: asset.digest,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn repo() -> RepoId {
        RepoId {
            owner: "danesparza".into(),
            repo: "daydash".into(),
        }
    }

    const RELEASES: &str = r#"[
        {
            "tag_name": "v1.3.0",
            "prerelease": false,
            "assets": [
                {
                    "name": "daydash-1.3.0.tar.gz",
                    "size": 10,
                    "browser_download_url": "https://example.com/v1.3.0/daydash-1.3.0.tar.gz",
                    "created_at": "2024-03-01T00:00:00Z"
                },
                {
                    "name": "daydash_1.3.0_armhf.deb",
                    "size": 2048,
                    "digest": "sha256:abcd",
                    "browser_download_url": "https://example.com/v1.3.0/daydash_1.3.0_armhf.deb",
                    "created_at": "2024-03-01T00:00:00Z"
                }
            ]
        },
        {
            "tag_name": "v1.2.0",
            "assets": [
                {
                    "name": "daydash_1.2.0_armhf.deb",
                    "size": 1024,
                    "browser_download_url": "https://example.com/v1.2.0/daydash_1.2.0_armhf.deb",
                    "created_at": "2024-02-01T00:00:00Z"
                },
                {
                    "name": "daydash_1.2.0_amd64.deb",
                    "size": 1100,
                    "browser_download_url": "https://example.com/v1.2.0/daydash_1.2.0_amd64.deb",
                    "created_at": "2024-02-01T00:00:00Z"
                }
            ]
        },
        {
            "tag_name": "v1.1.0",
            "assets": []
        }
    ]"#;

    #[tokio::test]
    async fn test_list_releases_keeps_native_packages_in_feed_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/danesparza/daydash/releases")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RELEASES)
            .expect(1)
            .create_async()
            .await;

        let feed = GitHubFeed::with_api_url(Client::new(), &server.url());
        let catalog = feed.list_releases(&repo()).await.unwrap();

        mock.assert_async().await;
        assert!(!catalog.payload_malformed);

        let names: Vec<&str> = catalog
            .candidates
            .iter()
            .map(|c| c.artifact_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "daydash_1.3.0_armhf.deb",
                "daydash_1.2.0_armhf.deb",
                "daydash_1.2.0_amd64.deb"
            ]
        );

        let latest = catalog.latest().unwrap();
        assert_eq!(latest.version, "v1.3.0");
        assert_eq!(
            latest.download_url,
            "https://example.com/v1.3.0/daydash_1.3.0_armhf.deb"
        );
        assert_eq!(latest.size, 2048);
        assert_eq!(latest.digest.as_deref(), Some("sha256:abcd"));
        assert_eq!(
            latest.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_list_releases_without_native_packages_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/danesparza/daydash/releases")
            .with_status(200)
            .with_body(
                r#"[{"tag_name": "v1.0.0", "assets": [
                    {"name": "daydash.zip", "size": 1, "browser_download_url": "https://example.com/a.zip"}
                ]}]"#,
            )
            .create_async()
            .await;

        let feed = GitHubFeed::with_api_url(Client::new(), &server.url());
        let catalog = feed.list_releases(&repo()).await.unwrap();

        assert!(catalog.is_empty());
        assert!(!catalog.payload_malformed);
    }

    #[tokio::test]
    async fn test_list_releases_not_found_is_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/danesparza/daydash/releases")
            .with_status(404)
            .create_async()
            .await;

        let feed = GitHubFeed::with_api_url(Client::new(), &server.url());
        let result = feed.list_releases(&repo()).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_releases_malformed_payload_is_flagged_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/danesparza/daydash/releases")
            .with_status(200)
            .with_body(r#"{"message": "this is not a list"}"#)
            .create_async()
            .await;

        let feed = GitHubFeed::with_api_url(Client::new(), &server.url());
        let catalog = feed.list_releases(&repo()).await.unwrap();

        assert!(catalog.is_empty());
        assert!(catalog.payload_malformed);
    }

    #[tokio::test]
    async fn test_list_releases_malformed_payload_strict() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/danesparza/daydash/releases")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let feed = GitHubFeed::with_api_url(Client::new(), &server.url()).strict_decode(true);
        let err = feed.list_releases(&repo()).await.unwrap_err();

        assert!(err.to_string().contains("Undecodable release payload"));
    }

    #[test]
    fn test_api_url_trailing_slash() {
        let feed = GitHubFeed::with_api_url(Client::new(), "https://ghe.example.com/api/v3/");
        assert_eq!(feed.api_url(), "https://ghe.example.com/api/v3");
    }
}
