//! HTTP client for the distribution server: implements `ReleaseSource`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use iris_update_common::Release;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::application::ports::ReleaseSource;
use crate::domain::AgentConfig;

/// `reqwest` client bound to one server.
pub struct HttpReleaseSource {
    client: reqwest::Client,
    base: String,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl HttpReleaseSource {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(base: &str, request_timeout: Duration, download_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("iris-update/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(request_timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            request_timeout,
            download_timeout,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(
            config.server_base(),
            Duration::from_secs(config.request_timeout_seconds),
            Duration::from_secs(config.download_timeout_seconds),
        )
    }
}

impl ReleaseSource for HttpReleaseSource {
    async fn latest(&self) -> Result<Option<Release>> {
        let url = format!("{}/latest", self.base);
        let resp = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            bail!("GET {url} returned {}", resp.status());
        }
        let release: Release = resp
            .json()
            .await
            .with_context(|| format!("parsing response from {url}"))?;
        Ok(Some(release))
    }

    async fn download(&self, version: u64, dest: &Path) -> Result<u64> {
        let url = format!("{}/download/{version}", self.base);
        let mut resp = self
            .client
            .get(&url)
            .timeout(self.download_timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            bail!("GET {url} returned {}", resp.status());
        }
        let expected = resp.content_length();

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("creating {}", dest.display()))?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp
            .chunk()
            .await
            .with_context(|| format!("reading body of {url}"))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", dest.display()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.context("flushing download")?;
        file.sync_all().await.context("syncing download")?;

        if let Some(expected) = expected {
            if expected != written {
                bail!("download truncated: expected {expected} bytes, got {written}");
            }
        }
        Ok(written)
    }
}
