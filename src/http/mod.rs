//! Retry-wrapped HTTP client shared by the acquisition and vocabulary pipelines.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::PipelineError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Media is written to disk in blocks of this size
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// Bounded attempts with a fixed delay between them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// HTTP client that retries each request a bounded number of times
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, policy })
    }

    /// Client for outbound fetches to the news source
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            Duration::from_secs(config.crawl.timeout_secs),
            RetryPolicy::new(config.crawl.retry_count, config.retry_delay()),
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send a request built fresh for every attempt; non-2xx counts as a failure
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempts = self.policy.attempts;
        for attempt in 1..=attempts {
            match build(&self.client).send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!("Request failed ({}/{}): {} ({})", attempt, attempts, url, e);
                    if attempt < attempts && !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Err(PipelineError::Network {
            url: url.to_string(),
            attempts,
        }
        .into())
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send_with_retry(url, |client| client.get(url)).await
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }

    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.get(url).await?;
        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .send_with_retry(url, |client| client.post(url).json(body))
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }

    /// Stream a remote file to `output_path`, replacing any previous content.
    ///
    /// Bytes go to a `.part` sibling first so an interrupted download never
    /// leaves a truncated file under the final name.
    pub async fn download_to_file(&self, url: &str, output_path: &Path) -> Result<u64> {
        let response = self.get(url).await?;

        let total_size = response.content_length().unwrap_or(0);
        let progress = ProgressBar::new(total_size);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?,
        );
        progress.set_message("Downloading audio...");

        let part_path = output_path.with_extension("part");
        let file = fs_err::File::create(&part_path)?;
        let mut writer = std::io::BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Download interrupted: {}", url))?;
            writer.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        writer.flush()?;
        drop(writer);
        fs_err::rename(&part_path, output_path)?;

        progress.finish_with_message("Download complete");
        tracing::info!(
            "Downloaded {} to {}",
            crate::utils::format_file_size(downloaded),
            output_path.display()
        );

        Ok(downloaded)
    }
}
