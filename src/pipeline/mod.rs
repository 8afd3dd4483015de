//! Acquisition orchestrator: ties page fetch → extraction → storage together.
//!
//! ## Run modes
//!
//! `run()`: one acquisition (cron use):
//!   1. Open a page session, wait for the readiness gate, read the markup,
//!      close the session.
//!   2. Stamp one capture timestamp, extract snapshot / trades / advancers /
//!      decliners.
//!   3. Hand the four batches to the store.
//!   Every batch is built before the first save, so a failed extraction
//!   writes nothing. An unavailable page never reaches extraction.
//!
//! `capture()`: step 1 and the timestamp only. Returns the page so the
//!   extractors can be exercised against a live capture without touching
//!   storage.

use crate::config::AppConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{CaptureTimestamp, MarketCapture, SnapshotRecord};
use crate::scraper::parsers::HtmlDocument;
use crate::scraper::readiness::{GateState, ReadinessGate};
use crate::scraper::tables::TableExtractor;
use crate::scraper::{PageFetcher, PageSession};
use crate::storage::MarketStore;
use std::time::Instant;
use tracing::{Instrument, error, info, info_span};

pub struct Pipeline<F> {
    fetcher: F,
    gate: ReadinessGate,
    extractor: TableExtractor,
    page_url: String,
}

/// Raw markup of a ready page and the instant it was taken.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    pub markup: String,
    pub captured_at: CaptureTimestamp,
}

impl CapturedPage {
    pub fn document(&self) -> HtmlDocument {
        HtmlDocument::parse(&self.markup)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct PipelineStats {
    pub captured_at: CaptureTimestamp,
    pub trades: usize,
    pub advancers: usize,
    pub decliners: usize,
}

impl<F: PageFetcher> Pipeline<F> {
    pub fn new(config: &AppConfig, fetcher: F) -> Self {
        Self {
            fetcher,
            gate: ReadinessGate::from_config(&config.scraper),
            extractor: TableExtractor::new(config.sections.clone(), config.extraction.row_policy),
            page_url: config.scraper.page_url.clone(),
        }
    }

    pub fn extractor(&self) -> &TableExtractor {
        &self.extractor
    }

    pub async fn run(&self, store: &dyn MarketStore) -> Result<PipelineStats> {
        let span = info_span!("acquisition", url = %self.page_url);
        async {
            let started = Instant::now();

            info!("=== Step 1: Waiting for market page ===");
            let page = self.capture().await?;

            info!("=== Step 2: Extracting tables ===");
            let capture = self.extractor.extract_all(&page.document())?;
            let snapshot = SnapshotRecord::from_table(&capture.snapshot)?;
            log_capture(&capture);

            info!("=== Step 3: Saving batches @ {} ===", page.captured_at);
            let at = page.captured_at;
            store.save_snapshot(&snapshot, at).map_err(ScrapeError::Storage)?;
            store.save_trades(&capture.trades, at).map_err(ScrapeError::Storage)?;
            store.save_advancers(&capture.advancers, at).map_err(ScrapeError::Storage)?;
            store.save_decliners(&capture.decliners, at).map_err(ScrapeError::Storage)?;

            let stats = PipelineStats {
                captured_at: at,
                trades: capture.trades.len(),
                advancers: capture.advancers.len(),
                decliners: capture.decliners.len(),
            };
            info!(
                "=== Done: {} trades | {} advancers | {} decliners (took {:.2?}) ===",
                stats.trades,
                stats.advancers,
                stats.decliners,
                started.elapsed()
            );
            Ok(stats)
        }
        .instrument(span)
        .await
    }

    /// Fetch the ready page without extracting or storing anything.
    pub async fn capture(&self) -> Result<CapturedPage> {
        let mut session = self.fetcher.open().await.map_err(ScrapeError::Session)?;
        let markup = self.read_when_ready(session.as_mut()).await;
        session.close().await;

        Ok(CapturedPage {
            markup: markup?,
            captured_at: CaptureTimestamp::now(),
        })
    }

    async fn read_when_ready(&self, session: &mut dyn PageSession) -> Result<String> {
        match self.gate.wait(session, &self.page_url).await {
            GateState::Ready { .. } => session.content().await.map_err(ScrapeError::Session),
            GateState::Exhausted { retries } | GateState::Polling { retries } => {
                let err = ScrapeError::PageUnavailable {
                    url: self.page_url.clone(),
                    marker: self.gate.marker_id().to_string(),
                    retries,
                };
                error!("CRITICAL: {}", err);
                Err(err)
            }
        }
    }
}

fn log_capture(capture: &MarketCapture) {
    info!(
        "Extracted {} snapshot rows, {} trades, {} advancers, {} decliners",
        capture.snapshot.len(),
        capture.trades.len(),
        capture.advancers.len(),
        capture.decliners.len()
    );
}
