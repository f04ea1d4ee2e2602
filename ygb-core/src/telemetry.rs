//! Frame pacing statistics for the executor loop.
//!
//! Each tick is measured against the deadline the pacer set for it. Work
//! that runs past the frame interval drops whole frames: the pacer never
//! catches up, so those frames are simply not emulated.

use std::time::{Duration, Instant};

/// One reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacingReport {
    pub ticks: u64,
    pub mean_work: Duration,
    pub max_work: Duration,
    /// Worst start delay past the deadline (scheduler jitter).
    pub max_late: Duration,
    pub dropped_frames: u64,
    /// Dropped frames since the loop started.
    pub total_dropped: u64,
}

pub struct PacingStats {
    interval: Duration,
    ticks: u64,
    work: Duration,
    max_work: Duration,
    max_late: Duration,
    dropped: u64,
    total_dropped: u64,
}

impl PacingStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticks: 0,
            work: Duration::ZERO,
            max_work: Duration::ZERO,
            max_late: Duration::ZERO,
            dropped: 0,
            total_dropped: 0,
        }
    }

    /// Record a tick that was due at `due`, started at `start` and finished
    /// at `end`.
    pub fn record(&mut self, due: Instant, start: Instant, end: Instant) {
        let work = end.saturating_duration_since(start);
        self.ticks += 1;
        self.work += work;
        self.max_work = self.max_work.max(work);
        self.max_late = self.max_late.max(start.saturating_duration_since(due));

        let dropped = self.frames_dropped_by(work);
        self.dropped += dropped;
        self.total_dropped += dropped;
    }

    /// Whole frame intervals a tick of `work` overran.
    fn frames_dropped_by(&self, work: Duration) -> u64 {
        if self.interval.is_zero() || work <= self.interval {
            return 0;
        }
        ((work - self.interval).as_nanos() / self.interval.as_nanos()) as u64 + 1
    }

    /// Report the current window and start a new one.
    pub fn take_report(&mut self) -> PacingReport {
        let report = PacingReport {
            ticks: self.ticks,
            mean_work: if self.ticks == 0 {
                Duration::ZERO
            } else {
                self.work / self.ticks as u32
            },
            max_work: self.max_work,
            max_late: self.max_late,
            dropped_frames: self.dropped,
            total_dropped: self.total_dropped,
        };
        self.ticks = 0;
        self.work = Duration::ZERO;
        self.max_work = Duration::ZERO;
        self.max_late = Duration::ZERO;
        self.dropped = 0;
        report
    }
}
