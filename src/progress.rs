//! Terminal progress bar driven by run events.

use crate::observer::{Observer, ScrapeEvent};
use crate::pager::PAGE_SIZE;
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{msg:>18}: {bar:40.cyan/blue} {pos}/{len} ({percent}%) [{elapsed_precise}<{eta}]";

/// Shows accumulated unique records against the target count.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(target: usize) -> Self {
        let bar = ProgressBar::new(target as u64);
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("Scraping jobs");
        ProgressObserver::with_bar(bar)
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        ProgressObserver { bar }
    }
}

impl Observer for ProgressObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        match event {
            ScrapeEvent::PageFetched { offset, total, .. } => {
                let len = self.bar.length().unwrap_or(u64::MAX);
                self.bar.set_position((*total as u64).min(len));
                self.bar.set_message(format!("Page {}", offset / PAGE_SIZE + 1));
            }
            ScrapeEvent::Waiting { delay } => {
                self.bar.set_message(format!("Waiting {:.1}s", delay.as_secs_f64()));
            }
            ScrapeEvent::PageFailed { offset, .. } => {
                self.bar.set_message(format!("Page {} failed", offset / PAGE_SIZE + 1));
            }
            ScrapeEvent::RunCompleted { .. } => self.bar.finish_and_clear(),
            ScrapeEvent::AttemptFailed { .. } | ScrapeEvent::CandidateSkipped { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::StopReason;

    #[test]
    fn position_tracks_total_and_is_capped() {
        let bar = ProgressBar::hidden();
        bar.set_length(10);
        let observer = ProgressObserver::with_bar(bar.clone());

        observer.on_event(&ScrapeEvent::PageFetched {
            offset: 0,
            accepted: 6,
            new: 6,
            total: 6,
        });
        assert_eq!(bar.position(), 6);

        observer.on_event(&ScrapeEvent::PageFetched {
            offset: 25,
            accepted: 8,
            new: 8,
            total: 14,
        });
        assert_eq!(bar.position(), 10);

        observer.on_event(&ScrapeEvent::RunCompleted {
            count: 10,
            reason: StopReason::TargetReached,
        });
        assert!(bar.is_finished());
    }
}
