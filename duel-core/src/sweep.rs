use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timing for the background pass that settles idle matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub interval: Duration,           // how often the sweep runs
    pub stale_after: Duration,        // untouched this long => settle it
    pub finished_retention: Duration, // finished matches kept this long
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(1),
            finished_retention: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl SweepPolicy {
    pub fn new(interval: Duration, stale_after: Duration, finished_retention: Duration) -> Self {
        Self {
            interval,
            stale_after,
            finished_retention,
        }
    }

    /// Running matches last written before this instant are due a settle.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.stale_after)
    }

    /// Finished matches last written before this instant may be purged.
    pub fn purge_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.finished_retention)
    }
}

fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
