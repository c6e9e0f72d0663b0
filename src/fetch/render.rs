// src/fetch/render.rs

//! Browser-rendered fetching for script-dependent pages.
//!
//! Owns the single shared headless-Chromium instance. The instance is
//! launched lazily on the first rendering-dependent check, and any render
//! error tears it down so the next check rebuilds fresh state instead of
//! retrying against a possibly corrupted session. Reconstruction cost is
//! accepted over cascading failures from a wedged session.
//!
//! The instance is not safe for concurrent use; the scheduler's sequential
//! dispatch is what keeps renders single-flight, not this module.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::BrowserConfig;
use crate::error::{AppError, Result};

/// Renders a URL to its final HTML, or fails.
#[async_trait]
pub trait PageRenderer: Send {
    /// Render the page at `url` and return the final document HTML.
    async fn render(&mut self, url: &str) -> Result<String>;

    /// Release the underlying instance, if live.
    async fn shutdown(&mut self);
}

/// A live browser plus the task draining its CDP event stream.
struct BrowserInstance {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Manager for the shared headless-Chromium instance.
pub struct BrowserRenderer {
    settings: BrowserConfig,
    instance: Option<BrowserInstance>,
}

impl BrowserRenderer {
    /// Create a renderer. No browser is launched until the first render.
    pub fn new(settings: BrowserConfig) -> Self {
        Self {
            settings,
            instance: None,
        }
    }

    /// Whether a browser instance is currently live.
    pub fn is_live(&self) -> bool {
        self.instance.is_some()
    }

    /// Launch the browser if no live instance exists. Idempotent.
    ///
    /// A launch failure leaves the instance absent; the next
    /// rendering-dependent due check retries construction, with no backoff.
    async fn ensure(&mut self) -> Result<()> {
        if self.instance.is_some() {
            return Ok(());
        }

        log::info!("Launching headless browser...");

        let mut builder = chromiumoxide::BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.settings.window_width, self.settings.window_height)
            .args(vec![
                "--disable-gpu",
                "--disable-dev-shm-usage",
                // Images are dead weight for change detection
                "--blink-settings=imagesEnabled=false",
            ]);
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(AppError::browser)?;

        let launch_budget = Duration::from_secs(self.settings.page_timeout_secs);
        let (browser, mut events) = timeout(launch_budget, Browser::launch(config))
            .await
            .map_err(|_| AppError::browser("launch timed out"))?
            .map_err(AppError::browser)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.instance = Some(BrowserInstance { browser, handler });
        Ok(())
    }

    async fn render_page(&mut self, url: &str) -> Result<String> {
        self.ensure().await?;
        let instance = self
            .instance
            .as_ref()
            .expect("browser instance ensured above");

        let page_budget = Duration::from_secs(self.settings.page_timeout_secs);

        let page = timeout(page_budget, instance.browser.new_page(url))
            .await
            .map_err(|_| AppError::render(url, "page load timed out"))?
            .map_err(|e| AppError::render(url, e))?;

        if let Err(e) = timeout(page_budget, page.wait_for_navigation())
            .await
            .map_err(|_| AppError::render(url, "navigation timed out"))?
        {
            return Err(AppError::render(url, e));
        }

        // Fixed settle delay so deferred scripts can populate content.
        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;

        let html = page.content().await.map_err(|e| AppError::render(url, e))?;
        let _ = page.close().await;
        Ok(html)
    }

    /// Tear down the live instance, best-effort. Teardown errors are
    /// swallowed; afterwards the instance is guaranteed absent.
    async fn teardown(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            log::info!("Tearing down browser instance");
            if let Err(e) = instance.browser.close().await {
                log::debug!("Browser close failed: {e}");
            }
            let _ = instance.browser.wait().await;
            instance.handler.abort();
        }
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(&mut self, url: &str) -> Result<String> {
        let result = self.render_page(url).await;
        if result.is_err() {
            // Any render failure may have corrupted the shared session;
            // drop it so the next check starts from a fresh launch.
            self.teardown().await;
        }
        result
    }

    async fn shutdown(&mut self) {
        self.teardown().await;
    }
}
