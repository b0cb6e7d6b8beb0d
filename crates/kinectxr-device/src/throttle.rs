//! Rate-limited error accounting for the USB event pump.
//!
//! Malformed USB packets are common and non-fatal with this hardware, so
//! per-iteration errors must not flood stderr. The pump records every error
//! and emits at most one summary per interval carrying the count.

use std::time::{Duration, Instant};

pub struct ErrorThrottle {
    interval: Duration,
    last_report: Option<Instant>,
    pending: u64,
}

impl ErrorThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
            pending: 0,
        }
    }

    /// Record one error at `now`. Returns `Some(count)` when a summary is
    /// due; the count covers every error since the previous summary.
    pub fn record(&mut self, now: Instant) -> Option<u64> {
        self.pending += 1;

        let due = match self.last_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };

        if due {
            self.last_report = Some(now);
            let count = self.pending;
            self.pending = 0;
            Some(count)
        } else {
            None
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
