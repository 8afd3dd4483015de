//! Readiness gate: polls a page session until the market widgets exist.
//!
//! The page finishes navigating long before its market tables render, and
//! nothing tells us when they do. So we probe for a marker element and, while
//! it is missing, reload and back off, up to a fixed number of retries.
//!
//! With `max_retries = n` a page that never becomes ready costs exactly
//! `n + 1` probes, `n + 1` navigations (the first load plus `n` reloads) and
//! `n` backoff waits.

use crate::config::ScraperConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PageSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Polling { retries: u32 },
    Ready { retries: u32 },
    Exhausted { retries: u32 },
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GateState::Polling { .. })
    }
}

pub struct ReadinessGate {
    marker_id: String,
    max_retries: u32,
    backoff: Duration,
}

impl ReadinessGate {
    pub fn new(marker_id: impl Into<String>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            marker_id: marker_id.into(),
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(&config.readiness_marker, config.max_retries, config.backoff())
    }

    pub fn marker_id(&self) -> &str {
        &self.marker_id
    }

    /// Load `url` and poll until the page is ready or the budget is spent.
    /// Returns the terminal state.
    pub async fn wait(&self, session: &mut dyn PageSession, url: &str) -> GateState {
        if let Err(e) = session.navigate(url).await {
            warn!("Initial load of {} failed: {:#}", url, e);
        }

        let mut state = GateState::Polling { retries: 0 };
        while !state.is_terminal() {
            state = self.tick(state, session, url).await;
        }
        state
    }

    /// One probe, and a reload + backoff if the page is not ready yet.
    pub async fn tick(&self, state: GateState, session: &mut dyn PageSession, url: &str) -> GateState {
        let GateState::Polling { retries } = state else {
            return state;
        };

        if self.probe(session).await {
            info!("Page ready after {} retries", retries);
            return GateState::Ready { retries };
        }

        if retries >= self.max_retries {
            return GateState::Exhausted { retries };
        }

        debug!(
            "Marker `{}` not found (retry {}/{}), reloading",
            self.marker_id,
            retries + 1,
            self.max_retries
        );
        if let Err(e) = session.navigate(url).await {
            warn!("Reload of {} failed: {:#}", url, e);
        }
        tokio::time::sleep(self.backoff).await;

        GateState::Polling { retries: retries + 1 }
    }

    /// A failed lookup counts as "not there yet".
    async fn probe(&self, session: &mut dyn PageSession) -> bool {
        match session.has_element(&self.marker_id).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Marker probe failed: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Counters shared between a scripted session and the test that owns it.
    #[derive(Default)]
    pub(crate) struct SessionLog {
        pub navigations: AtomicU32,
        pub probes: AtomicU32,
        pub closed: AtomicBool,
    }

    /// Session whose marker shows up on the `ready_on`-th probe (1-based).
    pub(crate) struct ScriptedSession {
        pub ready_on: Option<u32>,
        pub probe_errors: bool,
        pub markup: String,
        pub log: Arc<SessionLog>,
    }

    #[async_trait]
    impl PageSession for ScriptedSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            self.log.navigations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn has_element(&mut self, _element_id: &str) -> Result<bool> {
            let n = self.log.probes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.probe_errors {
                return Err(anyhow!("no such element"));
            }
            Ok(self.ready_on.is_some_and(|r| n >= r))
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.markup.clone())
        }

        async fn close(self: Box<Self>) {
            self.log.closed.store(true, Ordering::SeqCst);
        }
    }

    fn session(ready_on: Option<u32>) -> (ScriptedSession, Arc<SessionLog>) {
        let log = Arc::new(SessionLog::default());
        let s = ScriptedSession {
            ready_on,
            probe_errors: false,
            markup: String::new(),
            log: Arc::clone(&log),
        };
        (s, log)
    }

    fn gate() -> ReadinessGate {
        ReadinessGate::new("advancers", 12, Duration::from_secs(3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_tick() {
        let (mut s, log) = session(Some(1));
        let started = tokio::time::Instant::now();

        let state = gate().wait(&mut s, "http://example.test").await;

        assert_eq!(state, GateState::Ready { retries: 0 });
        assert_eq!(log.probes.load(Ordering::SeqCst), 1);
        assert_eq!(log.navigations.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_twelve_retries() {
        let (mut s, log) = session(None);
        let started = tokio::time::Instant::now();

        let state = gate().wait(&mut s, "http://example.test").await;

        assert_eq!(state, GateState::Exhausted { retries: 12 });
        assert_eq!(log.probes.load(Ordering::SeqCst), 13);
        assert_eq!(log.navigations.load(Ordering::SeqCst), 13);
        assert_eq!(started.elapsed(), Duration::from_secs(36));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_some_retries() {
        let (mut s, log) = session(Some(4));
        let state = gate().wait(&mut s, "http://example.test").await;
        assert_eq!(state, GateState::Ready { retries: 3 });
        assert_eq!(log.navigations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_count_as_not_ready() {
        let (mut s, log) = session(Some(1));
        s.probe_errors = true;
        let state = ReadinessGate::new("advancers", 2, Duration::from_secs(3))
            .wait(&mut s, "http://example.test")
            .await;
        assert_eq!(state, GateState::Exhausted { retries: 2 });
        assert_eq!(log.probes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_tick_leaves_terminal_states_alone() {
        let (mut s, log) = session(Some(1));
        let done = GateState::Exhausted { retries: 12 };
        let next = tokio_test::block_on(gate().tick(done, &mut s, "http://example.test"));
        assert_eq!(next, done);
        assert_eq!(log.probes.load(Ordering::SeqCst), 0);
    }
}
