//! HTTP client with status handling for the release feed and artifact host.
//!
//! Every call is a single attempt: failures are returned to the caller as-is.

use anyhow::{Context, Result};
use log::debug;
use reqwest::{Client, Response};
use std::io::Write;

use super::status::classify_status;

pub const USER_AGENT: &str = concat!("appupgrade/", env!("APPUPGRADE_VERSION"));

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a client that identifies itself with [`USER_AGENT`].
    pub fn with_user_agent() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Performs a GET request and returns the raw body of a 2xx response.
    #[tracing::instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}...", url);

        let response = self.send(url).await?;
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        Ok(body.to_vec())
    }

    /// Streams the body of a 2xx response into the writer produced by `create_writer`.
    ///
    /// The writer is only created once the response status is known to be
    /// successful. Returns the number of bytes written and the writer.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<(u64, W)>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let mut response = self.send(url).await?;
        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok((downloaded_bytes, writer))
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            return Err(classify_status(status, url, exhausted).into());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusError;

    #[tokio::test]
    async fn test_get_bytes_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "test"}"#)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let body = client.get_bytes(&format!("{}/test", url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, br#"{"name": "test"}"#);
    }

    #[tokio::test]
    async fn test_get_bytes_not_found() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let err = client
            .get_bytes(&format!("{}/test", url))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<StatusError>(),
            Some(StatusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_bytes_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let err = client
            .get_bytes(&format!("{}/test", url))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<StatusError>(),
            Some(StatusError::RateLimitExceeded(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        assert!(client.get_bytes(&format!("{}/test", url)).await.is_err());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_file_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/file.deb")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let (bytes, writer) = client
            .download_file(&format!("{}/file.deb", url), || Ok(Vec::new()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 12);
        assert_eq!(writer, b"test content");
    }

    #[tokio::test]
    async fn test_download_file_not_found_creates_no_writer() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/file.deb")
            .with_status(404)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result = client
            .download_file(&format!("{}/file.deb", url), || -> Result<Vec<u8>> {
                panic!("writer must not be created for a failed response")
            })
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_download_file_writer_failure() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/file.deb")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result = client
            .download_file(&format!("{}/file.deb", url), || -> Result<Vec<u8>> {
                Err(anyhow::anyhow!("disk full"))
            })
            .await;

        assert!(result.is_err());
    }
}
