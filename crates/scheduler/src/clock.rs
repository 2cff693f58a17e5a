//! A monotonic clock and an absolute-deadline sleep primitive. Sleeping
//! to an absolute time rather than a relative duration avoids
//! accumulating drift from the cost of everything done between
//! computing the duration and actually sleeping.

use std::time::{Duration, Instant};

pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock { start: Instant::now() }
    }

    /// Seconds elapsed since this clock was created.
    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Sleeps until `target` (seconds since this clock's creation),
    /// in slices no longer than `max_slice_s`, checking `keep_going`
    /// between slices so a long sleep can still be interrupted by a
    /// shutdown signal. Re-checks the clock after each slice rather
    /// than trusting `thread::sleep` to wake at exactly the requested
    /// time, since it's only guaranteed not to wake early.
    pub fn sleep_until(&self, target: f64, max_slice_s: f32, keep_going: impl Fn() -> bool) {
        loop {
            let now = self.now();
            let remaining = target - now;
            if remaining <= 0.0 || !keep_going() {
                return;
            }
            let slice = remaining.min(max_slice_s as f64);
            std::thread::sleep(Duration::from_secs_f64(slice));
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_until_past_target_returns_immediately() {
        let clock = Clock::new();
        let before = clock.now();
        clock.sleep_until(before - 1.0, 0.04, || true);
        assert!(clock.now() - before < 0.01);
    }

    #[test]
    fn sleep_until_honors_keep_going_false() {
        let clock = Clock::new();
        let before = clock.now();
        clock.sleep_until(before + 10.0, 0.04, || false);
        assert!(clock.now() - before < 0.01);
    }
}
