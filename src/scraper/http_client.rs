use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::parsers::markup_has_element;
use super::{PageFetcher, PageSession};

/// Static-HTML page source: every navigation is a plain GET.
pub struct HttpFetcher {
    inner: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(HttpSession {
            client: self.inner.clone(),
            body: None,
        }))
    }
}

pub struct HttpSession {
    client: reqwest::Client,
    body: Option<String>,
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("GET {}", url);
        self.body = None;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        let text = resp.text().await.context("Failed to read response body")?;
        self.body = Some(text);
        Ok(())
    }

    async fn has_element(&mut self, element_id: &str) -> Result<bool> {
        Ok(self
            .body
            .as_deref()
            .is_some_and(|body| markup_has_element(body, element_id)))
    }

    async fn content(&mut self) -> Result<String> {
        self.body.clone().context("No page loaded")
    }

    async fn close(self: Box<Self>) {
        debug!("HTTP session closed");
    }
}
