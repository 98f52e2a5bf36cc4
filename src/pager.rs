//! Pagination loop: fetch, extract, deduplicate, decide whether to continue.
//!
//! # State machine
//!
//! ```text
//!            ┌──────────── sleep(delay) ────────────┐
//!            ▼                                      │
//!       Fetching ── page / no page ──────────▶ Waiting
//!            │
//!            ├── terminal failure ─────────▶ Done(TransportTerminalFailure)
//!            ├── 3rd unproductive page ────▶ Done(TooManyConsecutiveEmptyPages)
//!            ├── target reached ───────────▶ Done(TargetReached)
//!            └── abort flag set ───────────▶ Done(Cancelled)
//! ```
//!
//! All mutable loop data lives in one [`RunState`] value that each transition
//! consumes and returns, so single transitions can be tested without a network.
//! A page that could not be fetched and a page with no accepted records both
//! count toward the same consecutive-empty limit.
//!
//! Requests are strictly sequential: the next page is not requested until the
//! previous one has been extracted and merged.

use crate::config::ScraperConfig;
use crate::dedupe::dedupe;
use crate::error::ScrapeError;
use crate::extractor::Extractor;
use crate::models::{PageResult, Record, SearchQuery};
use crate::observer::{Observer, ScrapeEvent};
use crate::transport::PageSource;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::instrument;

/// Listings requested per page; also the offset increment.
pub const PAGE_SIZE: usize = 25;

/// Unproductive pages in a row that end the run.
pub const MAX_CONSECUTIVE_EMPTY: u32 = 3;

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    TooManyConsecutiveEmptyPages,
    TransportTerminalFailure(ScrapeError),
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => f.write_str("target reached"),
            StopReason::TooManyConsecutiveEmptyPages => {
                f.write_str("too many consecutive empty pages")
            }
            StopReason::TransportTerminalFailure(e) => write!(f, "transport failure: {e}"),
            StopReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Where the loop goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerState {
    Fetching,
    Waiting(Duration),
    Done(StopReason),
}

#[derive(Debug, Clone)]
pub struct PagerSettings {
    pub page_size: usize,
    /// Pause between successive page requests.
    pub request_delay: Duration,
    /// Multiplier applied to `request_delay` after a page could not be fetched.
    pub no_page_delay_factor: u32,
    pub max_consecutive_empty: u32,
}

impl Default for PagerSettings {
    fn default() -> Self {
        PagerSettings {
            page_size: PAGE_SIZE,
            request_delay: Duration::from_millis(2500),
            no_page_delay_factor: 2,
            max_consecutive_empty: MAX_CONSECUTIVE_EMPTY,
        }
    }
}

impl From<&ScraperConfig> for PagerSettings {
    fn from(config: &ScraperConfig) -> Self {
        PagerSettings {
            request_delay: config.request_delay(),
            ..PagerSettings::default()
        }
    }
}

impl PagerSettings {
    /// Lower bound on how long a run for `target` records takes: one pause per
    /// page, ignoring request time and retries.
    pub fn estimated_duration(&self, target: usize) -> Duration {
        let pages = target.div_ceil(self.page_size.max(1));
        self.request_delay * u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// Renders an estimate like `~45 seconds` or `~2 min 5 sec`.
pub fn format_estimate(estimate: Duration) -> String {
    let secs = estimate.as_secs();
    if secs < 60 {
        format!("~{secs} seconds")
    } else {
        format!("~{} min {} sec", secs / 60, secs % 60)
    }
}

/// Mutable data of one run, owned by the pager for the run's duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    offset: usize,
    records: Vec<Record>,
    seen: HashSet<String>,
    consecutive_empty: u32,
}

impl RunState {
    pub fn new() -> Self {
        RunState::default()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Merge an extracted page and decide the next state.
    pub fn on_page(
        mut self,
        page: PageResult,
        target: usize,
        settings: &PagerSettings,
    ) -> (Self, PagerState) {
        if page.is_non_empty() {
            let (kept, seen) = dedupe(std::mem::take(&mut self.seen), page.records);
            self.seen = seen;
            self.records.extend(kept);
            self.consecutive_empty = 0;
        } else {
            self.consecutive_empty += 1;
            if self.consecutive_empty >= settings.max_consecutive_empty {
                return (self, PagerState::Done(StopReason::TooManyConsecutiveEmptyPages));
            }
        }

        self.offset += settings.page_size;

        if self.records.len() >= target {
            return (self, PagerState::Done(StopReason::TargetReached));
        }
        (self, PagerState::Waiting(settings.request_delay))
    }

    /// Transient failures exhausted the transport's retries. The offset is kept
    /// so the same page is requested again after a longer pause.
    pub fn on_no_page(mut self, settings: &PagerSettings) -> (Self, PagerState) {
        self.consecutive_empty += 1;
        if self.consecutive_empty >= settings.max_consecutive_empty {
            return (self, PagerState::Done(StopReason::TooManyConsecutiveEmptyPages));
        }
        let delay = settings
            .request_delay
            .saturating_mul(settings.no_page_delay_factor);
        (self, PagerState::Waiting(delay))
    }

    pub fn on_terminal(self, error: ScrapeError) -> (Self, PagerState) {
        (
            self,
            PagerState::Done(StopReason::TransportTerminalFailure(error)),
        )
    }

    /// Trim to at most `target` records, keeping encounter order.
    pub fn into_records(mut self, target: usize) -> Vec<Record> {
        self.records.truncate(target);
        self.records
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutcome {
    /// Unique records in encounter order, at most the target count.
    pub records: Vec<Record>,
    pub reason: StopReason,
    /// Offset the next page would have been requested at.
    pub final_offset: usize,
    pub pages_fetched: usize,
}

impl ScrapeOutcome {
    /// The terminal transport failure that ended the run, if any.
    pub fn failure(&self) -> Option<&ScrapeError> {
        match &self.reason {
            StopReason::TransportTerminalFailure(e) => Some(e),
            _ => None,
        }
    }
}

/// Drives a scrape over any [`PageSource`].
///
/// The pager itself holds no run state; every call to [`Pager::run`] starts
/// from a fresh [`RunState`].
pub struct Pager<S> {
    source: S,
    extractor: Extractor,
    settings: PagerSettings,
    observer: Arc<dyn Observer>,
}

impl<S: PageSource> Pager<S> {
    pub fn new(
        source: S,
        extractor: Extractor,
        settings: PagerSettings,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Pager {
            source,
            extractor,
            settings,
            observer,
        }
    }

    /// Run until the target is reached, the source dries up, a terminal
    /// failure occurs, or `abort` is set.
    ///
    /// `abort` is checked before every request, so a cancelled run still
    /// returns everything merged so far.
    #[instrument(
        level = "info",
        skip_all,
        fields(keywords = %query.keywords(), target = query.target_count())
    )]
    pub async fn run(&self, query: &SearchQuery, abort: &AtomicBool) -> ScrapeOutcome {
        let target = query.target_count();
        let mut run = RunState::new();
        let mut state = PagerState::Fetching;
        let mut pages_fetched = 0;

        loop {
            state = match state {
                PagerState::Fetching if abort.load(Ordering::Relaxed) => {
                    PagerState::Done(StopReason::Cancelled)
                }
                PagerState::Fetching => {
                    let offset = run.offset();
                    match self.source.fetch_page(query, offset).await {
                        Err(error) => {
                            let (next, next_state) = run.on_terminal(error);
                            run = next;
                            next_state
                        }
                        Ok(None) => {
                            let (next, next_state) = run.on_no_page(&self.settings);
                            run = next;
                            next_state
                        }
                        Ok(Some(markup)) => {
                            pages_fetched += 1;
                            let page = self.extractor.extract(&markup, self.observer.as_ref());
                            let accepted = page.records.len();
                            let before = run.records().len();
                            let (next, next_state) = run.on_page(page, target, &self.settings);
                            run = next;
                            self.observer.on_event(&ScrapeEvent::PageFetched {
                                offset,
                                accepted,
                                new: run.records().len() - before,
                                total: run.records().len(),
                            });
                            next_state
                        }
                    }
                }
                PagerState::Waiting(delay) => {
                    self.observer.on_event(&ScrapeEvent::Waiting { delay });
                    sleep(delay).await;
                    PagerState::Fetching
                }
                PagerState::Done(reason) => {
                    let final_offset = run.offset();
                    let records = run.into_records(target);
                    self.observer.on_event(&ScrapeEvent::RunCompleted {
                        count: records.len(),
                        reason: reason.clone(),
                    });
                    return ScrapeOutcome {
                        records,
                        reason,
                        final_offset,
                        pages_fetched,
                    };
                }
            };
        }
    }
}
