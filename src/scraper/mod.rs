pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod readiness;
pub mod tables;

#[cfg(feature = "browser")]
pub mod browser;

use crate::config::{FetcherKind, ScraperConfig};
use anyhow::Result;
use async_trait::async_trait;

use self::http_client::HttpFetcher;

// ── Source traits ─────────────────────────────────────────────────────────────

/// One live connection to the market page. Owned by a single run and closed
/// before that run returns, whatever the outcome.
#[async_trait]
pub trait PageSession: Send {
    /// (Re-)load `url`.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether an element with this id is currently on the page.
    async fn has_element(&mut self, element_id: &str) -> Result<bool>;

    /// Current page markup.
    async fn content(&mut self) -> Result<String>;

    /// Release the session's resources.
    async fn close(self: Box<Self>);
}

/// Swappable page source: plain HTTP or a headless browser.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

/// Fetcher picked by configuration.
pub fn fetcher_from_config(config: &ScraperConfig) -> Result<Box<dyn PageFetcher>> {
    match config.fetcher {
        FetcherKind::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        #[cfg(feature = "browser")]
        FetcherKind::Browser => Ok(Box::new(browser::ChromeFetcher::new(config))),
        #[cfg(not(feature = "browser"))]
        FetcherKind::Browser => {
            anyhow::bail!("fetcher = \"browser\" needs a build with `--features browser`")
        }
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        (**self).open().await
    }
}
