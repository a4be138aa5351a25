//! Live CDP page implementing [`PageSnapshotProvider`].

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::browser_manager::{build_browser_config, find_chrome_executable, LaunchOptions};
use super::challenge::has_challenge_markers;
use super::session_store;
use super::strategies::{run_strategies, ExtractionStrategy};
use crate::collect::{PageSnapshotProvider, ProviderError};
use crate::core::types::RawItem;

/// One browser process with one tab.
pub struct BrowserPage {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    opts: LaunchOptions,
}

impl BrowserPage {
    /// Launch a browser and open a blank tab. Stored login cookies at
    /// `storage_state` are injected before any navigation.
    pub async fn launch(
        opts: LaunchOptions,
        storage_state: Option<&Path>,
    ) -> Result<Self, ProviderError> {
        let exe = find_chrome_executable().ok_or_else(|| {
            ProviderError::Browser(
                "no Chromium-family browser found; set CHROME_EXECUTABLE".to_string(),
            )
        })?;
        info!(
            "launching browser ({}) headless={} fast={}",
            exe, opts.headless, opts.fast_mode
        );

        let config = build_browser_config(&exe, &opts)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProviderError::Browser(format!("failed to launch ({exe}): {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProviderError::Browser(format!("failed to open tab: {e}")))?;

        if let Some(cookies) = storage_state.and_then(session_store::load_raw) {
            session_store::inject_into_page(&page, &cookies).await;
        }

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            opts,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Cookie jar of the page as raw JSON values.
    pub async fn cookies(&self) -> Result<Vec<serde_json::Value>, ProviderError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| ProviderError::Script(format!("reading cookies: {e}")))?;
        Ok(cookies
            .into_iter()
            .filter_map(|c| serde_json::to_value(c).ok())
            .collect())
    }

    async fn html(&self) -> Result<String, ProviderError> {
        self.page
            .content()
            .await
            .map_err(|e| ProviderError::Script(format!("reading page content: {e}")))
    }

    /// Close the browser process. Errors are logged, not returned.
    pub async fn close(self) {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!("browser close error (non-fatal): {}", e);
        }
        let _ = browser.wait().await;
        self.handler.abort();
    }
}

#[async_trait]
impl PageSnapshotProvider for BrowserPage {
    async fn navigate(&self, url: &str) -> Result<(), ProviderError> {
        let timeout = self.opts.navigation_timeout;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ProviderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }

    async fn query_snapshot(
        &self,
        strategies: &[Box<dyn ExtractionStrategy>],
    ) -> Result<Vec<RawItem>, ProviderError> {
        let html = self.html().await?;
        let url = self.page.url().await.ok().flatten().unwrap_or_default();
        Ok(run_strategies(&url, &html, strategies))
    }

    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value, ProviderError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ProviderError::Script(e.to_string()))?;
        Ok(result.into_value::<serde_json::Value>().unwrap_or_default())
    }

    async fn detect_challenge_markers(&self) -> bool {
        match self.html().await {
            Ok(html) => has_challenge_markers(&html),
            Err(e) => {
                warn!("challenge check failed: {}", e);
                false
            }
        }
    }
}

/// A visible browser kept open while the user logs in by hand.
pub struct LoginSession {
    page: BrowserPage,
}

impl LoginSession {
    pub async fn open(start_url: &str, storage_state: &Path) -> Result<Self, ProviderError> {
        let opts = LaunchOptions {
            headless: false,
            ..LaunchOptions::default()
        };
        let page = BrowserPage::launch(opts, Some(storage_state)).await?;
        page.navigate(start_url).await?;
        info!("login page open at {}", start_url);
        Ok(Self { page })
    }

    /// Persist the current cookie jar to `storage_state` and close the browser.
    pub async fn save(self, storage_state: &Path) -> anyhow::Result<usize> {
        let cookies = self.page.cookies().await;
        let saved = match cookies {
            Ok(cookies) => session_store::save_raw(storage_state, &cookies).map(|_| cookies.len()),
            Err(e) => Err(e.into()),
        };
        self.page.close().await;
        saved
    }

    pub async fn close(self) {
        self.page.close().await;
    }
}
