//! Artifact retrieval into scratch files, with size and digest verification.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::http::HttpClient;
use crate::package::NATIVE_PACKAGE_EXTENSION;
use crate::provider::ReleaseCandidate;
use crate::runtime::Runtime;

const SCRATCH_PREFIX: &str = "appupgrade";

/// Expectations a downloaded artifact must meet. Absent expectations are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactCheck {
    pub expected_size: Option<u64>,
    /// Lowercase hex SHA-256
    pub expected_sha256: Option<String>,
}

impl ArtifactCheck {
    /// Build the expectations advertised by the feed for `candidate`.
    pub fn for_candidate(candidate: &ReleaseCandidate) -> Self {
        let expected_sha256 = match candidate.digest.as_deref() {
            Some(digest) => match digest.split_once(':') {
                Some((algorithm, hex)) if algorithm.eq_ignore_ascii_case("sha256") => {
                    Some(hex.to_ascii_lowercase())
                }
                _ => {
                    debug!("Ignoring unsupported digest '{}'", digest);
                    None
                }
            },
            None => None,
        };

        Self {
            expected_size: (candidate.size > 0).then_some(candidate.size),
            expected_sha256,
        }
    }

    pub fn verify(&self, size: u64, sha256: &str) -> Result<()> {
        if let Some(expected) = self.expected_size.filter(|&expected| expected != size) {
            bail!("size mismatch: expected {} bytes, got {}", expected, size);
        }
        if let Some(expected) = self
            .expected_sha256
            .as_deref()
            .filter(|&expected| expected != sha256)
        {
            bail!("sha256 mismatch: expected {}, got {}", expected, sha256);
        }
        Ok(())
    }
}

/// Retrieves a remote artifact to a local scratch file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Download `url` in full and return the path of the file holding it.
    /// The file is left on disk for the caller only once it has passed
    /// `check`; a failed or abandoned download leaves nothing behind.
    async fn download(&self, url: &str, check: &ArtifactCheck) -> Result<PathBuf>;
}

pub struct HttpRetriever<R: Runtime> {
    runtime: Arc<R>,
    http_client: HttpClient,
}

impl<R: Runtime> HttpRetriever<R> {
    pub fn new(runtime: Arc<R>, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }
}

#[async_trait]
impl<R: Runtime> Retriever for HttpRetriever<R> {
    #[tracing::instrument(skip(self, check))]
    async fn download(&self, url: &str, check: &ArtifactCheck) -> Result<PathBuf> {
        info!("Downloading {}...", url);

        let (size, writer) = self
            .http_client
            .download_file(url, || {
                let scratch = self
                    .runtime
                    .create_scratch_file(SCRATCH_PREFIX, NATIVE_PACKAGE_EXTENSION)
                    .context("Failed to create scratch file")?;
                Ok(HashingWriter::new(scratch))
            })
            .await?;

        let (scratch, sha256) = writer.finish();
        check
            .verify(size, &sha256)
            .with_context(|| format!("Downloaded artifact from {} failed verification", url))?;

        let path = scratch.keep()?;
        info!("Download complete: {} bytes to {:?}", size, path);
        Ok(path)
    }
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// The inner writer and the lowercase hex SHA-256 of everything written.
    fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
