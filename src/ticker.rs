//! Recurring fetch-and-parse cycles for a single feed source.
//!
//! A [`Ticker`] owns at most one schedule. Each schedule is a spawned task
//! driven by one `tokio::time::interval`; cycles run inside that task one
//! after another, so a slow fetch delays the next tick instead of stacking
//! up concurrent requests. Every cycle produces exactly one [`TickerEvent`].

use crate::feed::{parse_feed, FeedItem, FetchFeed};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Lower bound for the refresh interval.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Label used in error messages when a source has no name of its own.
pub const DEFAULT_SOURCE_NAME: &str = "News";

/// One feed to poll. Changing any field means calling [`Ticker::configure`] again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    /// Prefix for error messages, e.g. `"News update failed: ..."`
    pub name: String,
    pub url: String,
    /// Always at least 1
    pub max_items: usize,
    /// Always at least [`MIN_UPDATE_INTERVAL`]
    pub interval: Duration,
}

impl FeedSource {
    /// Builds a source, clamping `max_items` to at least 1 and the interval
    /// to at least 60 seconds.
    pub fn new(url: impl Into<String>, max_items: usize, interval_ms: u64) -> Self {
        Self {
            name: DEFAULT_SOURCE_NAME.to_string(),
            url: url.into(),
            max_items: max_items.max(1),
            interval: Duration::from_millis(interval_ms).max(MIN_UPDATE_INTERVAL),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Outcome of one cycle, as delivered to the consumer.
///
/// Serializes to `{"items": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TickerEvent {
    News {
        items: Vec<FeedItem>,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

/// Runs one fetch-and-parse cycle. Never fails: errors become [`TickerEvent::Error`].
pub async fn run_cycle(fetcher: &dyn FetchFeed, source: &FeedSource) -> TickerEvent {
    match fetcher.fetch_feed(&source.url).await {
        Ok(text) => {
            let items = parse_feed(&text, source.max_items);
            tracing::info!(url = %source.url, items = items.len(), "Feed updated");
            TickerEvent::News { items }
        }
        Err(e) => {
            tracing::warn!(url = %source.url, error = %e, "Feed update failed");
            TickerEvent::Error {
                message: format!("{} update failed: {e}", source.name),
            }
        }
    }
}

struct Schedule {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives a [`FetchFeed`] on a recurring schedule and reports each outcome
/// on an `mpsc` channel.
///
/// Must be used from within a Tokio runtime.
pub struct Ticker {
    fetcher: Arc<dyn FetchFeed>,
    events: mpsc::Sender<TickerEvent>,
    source: Option<FeedSource>,
    schedule: Option<Schedule>,
    reload_on_suspend: bool,
    suspended: bool,
}

impl Ticker {
    pub fn new(fetcher: Arc<dyn FetchFeed>, events: mpsc::Sender<TickerEvent>) -> Self {
        Self {
            fetcher,
            events,
            source: None,
            schedule: None,
            reload_on_suspend: true,
            suspended: false,
        }
    }

    /// Whether [`Ticker::resume`] refreshes immediately after a suspend. On by default.
    pub fn set_reload_on_suspend(&mut self, enabled: bool) {
        self.reload_on_suspend = enabled;
    }

    /// The source of the current schedule, if any.
    pub fn source(&self) -> Option<&FeedSource> {
        self.source.as_ref()
    }

    /// True while a schedule task is alive.
    pub fn is_running(&self) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Replaces the current schedule with one for `source`.
    ///
    /// The previous schedule is stopped, one cycle runs immediately, and
    /// further cycles follow every `source.interval`.
    pub fn configure(&mut self, source: FeedSource) {
        self.stop();

        tracing::info!(
            url = %source.url,
            max_items = source.max_items,
            interval_secs = source.interval.as_secs(),
            "Scheduling feed updates"
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.fetcher),
            source.clone(),
            self.events.clone(),
            shutdown_rx,
        ));

        self.schedule = Some(Schedule { shutdown, handle });
        self.source = Some(source);
    }

    /// Stops the schedule. A cycle already in flight still completes and reports.
    pub fn stop(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            // Err only means the task already exited
            let _ = schedule.shutdown.send(true);
            tracing::debug!("Feed schedule stopped");
        }
    }

    /// Marks the ticker as suspended (e.g. the display went to sleep).
    ///
    /// Scheduling continues; suspension only matters to [`Ticker::resume`].
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Leaves the suspended state, re-issuing the current configuration when
    /// reload-on-suspend is enabled so fresh items show up right away.
    pub fn resume(&mut self) {
        let was_suspended = std::mem::replace(&mut self.suspended, false);
        if !was_suspended || !self.reload_on_suspend {
            return;
        }
        if let Some(source) = self.source.clone() {
            tracing::debug!(url = %source.url, "Resumed, refreshing feed");
            self.configure(source);
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_schedule(
    fetcher: Arc<dyn FetchFeed>,
    source: FeedSource,
    events: mpsc::Sender<TickerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    // First tick completes immediately
    let mut interval = tokio::time::interval(source.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        let event = run_cycle(fetcher.as_ref(), &source).await;
        if events.send(event).await.is_err() {
            tracing::debug!(url = %source.url, "Event receiver dropped, ending schedule");
            break;
        }
    }
}
