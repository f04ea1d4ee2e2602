//! Frame pacing arithmetic and the executor's re-entry guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ygb_types::{BASE_FREQ_HZ, CYCLES_PER_FRAME, VISUAL_FREQ_HZ};

/// Nominal frame interval, 1/59.7 s (about 16.75 ms).
pub fn frame_interval() -> Duration {
    Duration::from_secs_f64(1.0 / VISUAL_FREQ_HZ)
}

/// Cycle budget for one frame at `scale`.
pub fn cycles_per_frame(scale: f64) -> u64 {
    (BASE_FREQ_HZ as f64 * scale / VISUAL_FREQ_HZ).floor() as u64
}

/// Frames per second implied by `executed` cycles over `elapsed`.
pub fn achieved_fps(executed: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    executed as f64 / CYCLES_PER_FRAME / secs
}

/// Decides when the next tick is due.
///
/// After a tick that started at `start` and finished at `end`, the next tick
/// is due at `max(start + interval, end)`: the loop sleeps off whatever is
/// left of the interval and never builds up sleep debt.
pub struct FramePacer {
    interval: Duration,
    next_due: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Time left until the next tick, zero if overdue.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Record a finished tick.
    pub fn finish(&mut self, start: Instant, end: Instant) {
        self.next_due = (start + self.interval).max(end);
    }
}

/// Held while an executor loop runs. A second loop on the same flag is
/// refused until the first guard drops.
pub struct LoopGuard {
    flag: Arc<AtomicBool>,
}

impl LoopGuard {
    pub fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_at_nominal_speed() {
        assert_eq!(cycles_per_frame(1.0), 70_256);
        assert_eq!(cycles_per_frame(2.0), 140_512);
        assert_eq!(cycles_per_frame(0.5), 35_128);
    }

    #[test]
    fn interval_is_about_16_75ms() {
        let ms = frame_interval().as_secs_f64() * 1000.0;
        assert!((ms - 16.7504).abs() < 1e-3);
    }

    #[test]
    fn fps_of_one_frame_per_interval() {
        let fps = achieved_fps(CYCLES_PER_FRAME as u64, frame_interval());
        assert!((fps - VISUAL_FREQ_HZ).abs() < 0.01);
        assert_eq!(achieved_fps(1000, Duration::ZERO), 0.0);
    }

    #[test]
    fn short_work_sleeps_the_remainder() {
        let interval = Duration::from_millis(16);
        let mut pacer = FramePacer::new(interval);
        let start = Instant::now();
        pacer.finish(start, start + Duration::from_millis(4));
        assert_eq!(pacer.next_due(), start + interval);
        assert_eq!(
            pacer.remaining(start + Duration::from_millis(4)),
            Duration::from_millis(12)
        );
    }

    #[test]
    fn long_work_does_not_accumulate_debt() {
        let interval = Duration::from_millis(16);
        let mut pacer = FramePacer::new(interval);
        let start = Instant::now();
        let end = start + Duration::from_millis(40);
        pacer.finish(start, end);
        assert_eq!(pacer.next_due(), end);
        assert!(pacer.is_due(end));
        assert_eq!(pacer.remaining(end), Duration::ZERO);
    }

    #[test]
    fn guard_refuses_second_loop() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = LoopGuard::acquire(&flag).unwrap();
        assert!(LoopGuard::acquire(&flag).is_none());
        drop(first);
        assert!(LoopGuard::acquire(&flag).is_some());
    }
}
