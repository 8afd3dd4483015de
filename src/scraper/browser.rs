//! Headless Chrome page source, for when the market widgets are rendered
//! client-side. Built only with `--features browser`.

use crate::config::ScraperConfig;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{PageFetcher, PageSession};

pub struct ChromeFetcher {
    browser_binary: Option<PathBuf>,
    page_timeout: Duration,
}

impl ChromeFetcher {
    pub fn new(config: &ScraperConfig) -> Self {
        if let Some(driver) = &config.driver_path {
            debug!("driver_path {:?} not needed for a DevTools session", driver);
        }
        Self {
            browser_binary: config.browser_binary.clone(),
            page_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn launch(&self) -> Result<ChromeSession> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(self.browser_binary.clone())
            .args(vec![OsStr::new("--disable-gpu"), OsStr::new("--log-level=3")])
            .build()
            .map_err(|e| anyhow!("Invalid browser options: {}", e))?;

        let browser = Browser::new(options).context("Failed to launch headless Chrome")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(self.page_timeout);
        info!("Headless Chrome started");

        Ok(ChromeSession {
            browser: Some(browser),
            tab,
            page_timeout: self.page_timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let session = tokio::task::block_in_place(|| self.launch())?;
        Ok(Box::new(session))
    }
}

/// Owns the browser process; dropping it kills Chrome.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    page_timeout: Duration,
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigate {}", url);
        tokio::task::block_in_place(|| {
            self.tab.set_default_timeout(self.page_timeout);
            self.tab
                .navigate_to(url)?
                .wait_until_navigated()
                .with_context(|| format!("Navigation to {} failed", url))?;
            Ok(())
        })
    }

    /// One DOM query, no waiting: the readiness gate owns the backoff.
    async fn has_element(&mut self, element_id: &str) -> Result<bool> {
        let selector = format!("[id=\"{}\"]", element_id);
        tokio::task::block_in_place(|| Ok(self.tab.find_element(&selector).is_ok()))
    }

    async fn content(&mut self) -> Result<String> {
        tokio::task::block_in_place(|| self.tab.get_content().context("Failed to read page content"))
    }

    async fn close(self: Box<Self>) {
        let ChromeSession { browser, tab, .. } = *self;
        drop(tab);
        tokio::task::block_in_place(|| drop(browser));
        info!("Headless Chrome stopped");
    }
}
