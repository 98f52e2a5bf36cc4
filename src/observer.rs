//! Progress and diagnostics reporting for a scrape run.
//!
//! The transport, extractor, and pager never log or print on their own; they
//! hand [`ScrapeEvent`]s to an injected [`Observer`]. Observers are
//! synchronous and infallible, so reporting can never stall or steer the run.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`TracingObserver`] | Structured log lines via `tracing` |
//! | [`ChannelObserver`] | Forward events to another task over an unbounded channel |
//! | [`Observers`] | Fan one event out to several observers |
//! | `progress::ProgressObserver` | Terminal progress bar |

use crate::error::{CandidateError, ScrapeError};
use crate::pager::StopReason;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    /// A page was fetched and extracted.
    PageFetched {
        offset: usize,
        /// Records accepted by the extractor on this page.
        accepted: usize,
        /// Accepted records that were not duplicates.
        new: usize,
        /// Accumulated unique records so far.
        total: usize,
    },
    /// The page at `offset` could not be fetched.
    PageFailed { offset: usize, error: ScrapeError },
    /// One attempt inside the transport's retry loop failed.
    AttemptFailed {
        offset: usize,
        attempt: u32,
        max: u32,
        error: ScrapeError,
    },
    /// A candidate element was skipped because it could not be parsed.
    CandidateSkipped { index: usize, error: CandidateError },
    /// The pager is sleeping before the next request.
    Waiting { delay: Duration },
    /// The run ended.
    RunCompleted { count: usize, reason: StopReason },
}

/// Receives run events. Must return promptly and must not panic.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &ScrapeEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        match event {
            ScrapeEvent::PageFetched {
                offset,
                accepted,
                new,
                total,
            } => info!(offset, accepted, new, total, "Fetched results page"),
            ScrapeEvent::PageFailed { offset, error } => {
                warn!(offset, kind = error.kind(), error = %error, "No page available")
            }
            ScrapeEvent::AttemptFailed {
                offset,
                attempt,
                max,
                error,
            } => warn!(
                offset,
                attempt,
                max,
                kind = error.kind(),
                error = %error,
                "Request attempt failed"
            ),
            ScrapeEvent::CandidateSkipped { index, error } => {
                debug!(index, error = %error, "Skipped listing candidate")
            }
            ScrapeEvent::Waiting { delay } => debug!(?delay, "Waiting before next request"),
            ScrapeEvent::RunCompleted { count, reason } => {
                info!(count, reason = %reason, "Scrape finished")
            }
        }
    }
}

/// Forwards events to a receiver on another task.
///
/// Uses an unbounded channel so sending never waits. Events sent after the
/// receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<ScrapeEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<ScrapeEvent>) -> Self {
        ChannelObserver { tx }
    }
}

impl Observer for ChannelObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Delivers each event to every contained observer, in order.
#[derive(Default)]
pub struct Observers(Vec<Box<dyn Observer>>);

impl Observers {
    pub fn new() -> Self {
        Observers(Vec::new())
    }

    pub fn with(mut self, observer: impl Observer + 'static) -> Self {
        self.0.push(Box::new(observer));
        self
    }
}

impl Observer for Observers {
    fn on_event(&self, event: &ScrapeEvent) {
        for observer in &self.0 {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn channel_observer_forwards_and_ignores_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);

        observer.on_event(&ScrapeEvent::Waiting {
            delay: Duration::from_secs(1),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            ScrapeEvent::Waiting {
                delay: Duration::from_secs(1)
            }
        );

        drop(rx);
        observer.on_event(&ScrapeEvent::RunCompleted {
            count: 0,
            reason: StopReason::TargetReached,
        });
    }

    #[test]
    fn fan_out_reaches_every_observer() {
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let observers = Observers::new()
            .with(ChannelObserver::new(tx_a))
            .with(TracingObserver)
            .with(ChannelObserver::new(tx_b));

        let event = ScrapeEvent::PageFetched {
            offset: 25,
            accepted: 3,
            new: 2,
            total: 10,
        };
        observers.on_event(&event);

        assert_eq!(rx_a.try_recv().unwrap(), event);
        assert_eq!(rx_b.try_recv().unwrap(), event);
    }
}
