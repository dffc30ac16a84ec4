// Concrete session engines: local headless Chrome and Browserless.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use tempfile::TempDir;
use tracing::{info, warn};

use super::session::{BrowserSession, PageRenderer, RenderedSession, SessionEngine};
use crate::error::{EnrichError, Result};

/// Time allowed for `chrome --version` when probing the binary.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to build HTTP client")
}

async fn download_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if status.is_server_error() || status.as_u16() == 429 {
        return Err(EnrichError::TransientNetwork(format!("{url} returned {status}")));
    }
    if !status.is_success() {
        return Err(EnrichError::Other(anyhow::anyhow!("{url} returned {status}")));
    }
    Ok(resp.text().await?)
}

fn check_http_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).context("Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(EnrichError::Other(anyhow::anyhow!(
            "Only http/https URLs allowed, got: {}",
            parsed.scheme()
        )));
    }
    Ok(())
}

// --- Chrome ---

/// Headless Chromium driven through `--dump-dom`, one process per render.
pub struct ChromeEngine {
    chrome_bin: String,
    render_timeout: Duration,
}

impl ChromeEngine {
    pub fn new(chrome_bin: &str, render_timeout: Duration) -> Self {
        Self {
            chrome_bin: chrome_bin.to_string(),
            render_timeout,
        }
    }
}

#[async_trait]
impl SessionEngine for ChromeEngine {
    fn name(&self) -> &str {
        "chrome"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let probe = tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::process::Command::new(&self.chrome_bin)
                .arg("--version")
                .output(),
        )
        .await;

        match probe {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                info!(chrome_bin = %self.chrome_bin, version = %version, "chrome available");
            }
            Ok(Ok(output)) => {
                return Err(EnrichError::Other(anyhow::anyhow!(
                    "{} --version exited with {}",
                    self.chrome_bin,
                    output.status
                )));
            }
            Ok(Err(e)) => {
                return Err(EnrichError::Other(anyhow::anyhow!(
                    "failed to launch {}: {e}",
                    self.chrome_bin
                )));
            }
            Err(_) => {
                return Err(EnrichError::Other(anyhow::anyhow!(
                    "{} --version timed out",
                    self.chrome_bin
                )));
            }
        }

        let profile = tempfile::tempdir().context("Failed to create temp profile dir")?;
        let renderer = ChromeRenderer {
            chrome_bin: self.chrome_bin.clone(),
            render_timeout: self.render_timeout,
            profile: tokio::sync::Mutex::new(Some(profile)),
            http: http_client(self.render_timeout),
        };
        Ok(Box::new(RenderedSession::new("chrome", renderer)))
    }
}

struct ChromeRenderer {
    chrome_bin: String,
    render_timeout: Duration,
    /// Profile shared by every render in the session; removed on shutdown.
    profile: tokio::sync::Mutex<Option<TempDir>>,
    http: reqwest::Client,
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        check_http_url(url)?;

        let profile_dir = {
            let guard = self.profile.lock().await;
            match guard.as_ref() {
                Some(dir) => dir.path().display().to_string(),
                None => {
                    return Err(EnrichError::FormInteraction(
                        "chrome session already shut down".into(),
                    ))
                }
            }
        };

        let result = tokio::time::timeout(
            self.render_timeout,
            tokio::process::Command::new(&self.chrome_bin)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    &format!("--user-data-dir={profile_dir}"),
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(url, fetcher = "chrome", stderr = %stderr, "Chrome exited with error");
                Err(EnrichError::Other(anyhow::anyhow!(
                    "chrome exited with {} for {url}",
                    output.status
                )))
            }
            Ok(Err(e)) => Err(EnrichError::Other(anyhow::anyhow!(
                "Failed to run Chrome for {url}: {e}"
            ))),
            Err(_) => Err(EnrichError::RenderTimeout(self.render_timeout)),
        }
    }

    async fn download(&self, url: &str) -> Result<String> {
        download_text(&self.http, url).await
    }

    async fn shutdown(&self) {
        if let Some(dir) = self.profile.lock().await.take() {
            if let Err(e) = dir.close() {
                warn!(error = %e, "failed to remove chrome profile dir");
            }
        }
    }
}

// --- Browserless ---

/// Remote rendering through a Browserless instance's `/content` endpoint.
pub struct BrowserlessEngine {
    client: Arc<BrowserlessClient>,
    render_timeout: Duration,
}

impl BrowserlessEngine {
    pub fn new(base_url: &str, token: Option<&str>, render_timeout: Duration) -> Self {
        Self {
            client: Arc::new(BrowserlessClient::with_timeout(base_url, token, render_timeout)),
            render_timeout,
        }
    }
}

#[async_trait]
impl SessionEngine for BrowserlessEngine {
    fn name(&self) -> &str {
        "browserless"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.client.ping().await?;
        info!(base_url = self.client.base_url(), "browserless reachable");
        let renderer = BrowserlessRenderer {
            client: self.client.clone(),
            http: http_client(self.render_timeout),
        };
        Ok(Box::new(RenderedSession::new("browserless", renderer)))
    }
}

struct BrowserlessRenderer {
    client: Arc<BrowserlessClient>,
    http: reqwest::Client,
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        check_http_url(url)?;
        Ok(self.client.content(url).await?)
    }

    async fn download(&self, url: &str) -> Result<String> {
        download_text(&self.http, url).await
    }
}
