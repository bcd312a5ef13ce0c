//! Page fetch clients.
//!
//! Thread pages hide some content behind scripts, so the scraper can fetch
//! either with a plain HTTP client or through a headless browser that returns
//! the rendered document. Both sit behind `PageFetcher` so page types and
//! jobs never care which one is in use.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::url::PageUrl;
use crate::config::Config;
use crate::constants::SCRAPE_USER_AGENT;
use crate::error::ScrapeError;

/// Capability to turn a page descriptor into document HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &PageUrl) -> Result<String, ScrapeError>;
}

/// Plain HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(SCRAPE_USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch a URL as text, mapping transport and status failures.
    pub(crate) async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| ScrapeError::Fetch {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &PageUrl) -> Result<String, ScrapeError> {
        debug!(url = %url, "Fetching page");
        self.get_text(url.as_str()).await
    }
}

/// Headless-browser fetcher.
///
/// The browser is lazily launched on first use and shared for the life of
/// the process.
pub struct BrowserFetcher {
    page_timeout: Duration,
    chrome_path: Option<String>,
    browser: Arc<Mutex<Option<Browser>>>,
}

impl BrowserFetcher {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            page_timeout: config.request_timeout,
            chrome_path: config.chrome_path.clone(),
            browser: Arc::new(Mutex::new(None)),
        }
    }

    async fn ensure_browser(&self) -> Result<(), ScrapeError> {
        let mut browser_guard = self.browser.lock().await;
        if browser_guard.is_some() {
            return Ok(());
        }

        info!("Launching headless browser");

        let mut config_builder = BrowserConfig::builder()
            .request_timeout(self.page_timeout)
            .no_sandbox()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");

        if let Some(ref chrome_path) = self.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder.build().map_err(|e| ScrapeError::Render {
            url: String::new(),
            message: format!("failed to build browser config: {e}"),
        })?;

        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| ScrapeError::Render {
                    url: String::new(),
                    message: format!("failed to launch browser: {e}"),
                })?;

        // The CDP event stream must be drained for the browser to make progress.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        *browser_guard = Some(browser);
        info!("Headless browser ready");

        Ok(())
    }

    /// Shut the browser down gracefully.
    pub async fn shutdown(&self) {
        let mut browser_guard = self.browser.lock().await;
        if let Some(mut browser) = browser_guard.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {e}");
            }
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &PageUrl) -> Result<String, ScrapeError> {
        self.ensure_browser().await?;

        let browser_guard = self.browser.lock().await;
        let browser = browser_guard.as_ref().ok_or_else(|| ScrapeError::Render {
            url: url.to_string(),
            message: "browser not initialized".to_string(),
        })?;

        debug!(url = %url, "Rendering page");

        let render_err = |message: String| ScrapeError::Render {
            url: url.to_string(),
            message,
        };

        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| render_err(format!("failed to open page: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| render_err(format!("navigation failed: {e}")))?;

        // Give scripts a moment to fill in late content.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let html = page
            .content()
            .await
            .map_err(|e| render_err(format!("failed to read document: {e}")))?;

        if let Err(e) = page.close().await {
            warn!(url = %url, "Failed to close page: {e}");
        }

        Ok(html)
    }
}
