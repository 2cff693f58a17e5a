//! The cooperative single-threaded scheduler: relays pin edges to
//! `hw-scheduler`, alternates between short and wide idle-CPU
//! intervals, and owns the shutdown sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hw_scheduler::constants::FRAMES_PER_SEC;
use hw_scheduler::{HardwareScheduler, MemoryMap};
use io_drivers::{EdgeSink, OutputEvent, PinRegistry};
use thread_priority::{set_current_thread_priority, ThreadPriority};

use crate::clock::Clock;
use crate::error::SchedulerError;

/// Default short idle-CPU interval: frequent enough to catch a
/// thermistor's sense pin going high without much latency.
pub const DEFAULT_SHORT_INTERVAL_S: f32 = 0.0005;

/// Default wide idle-CPU interval: infrequent work (PID updates,
/// safety checks, drift checks) doesn't need millisecond latency.
pub const DEFAULT_WIDE_INTERVAL_S: f32 = 0.5;

/// A wide interval is forced at least this often even if nothing
/// requested it, so slow-changing state never goes unchecked for long.
pub const WIDE_EVERY_N_SHORT: u32 = 2048;

/// Each `sleep_until` call blocks in slices no longer than this, so a
/// shutdown signal received mid-sleep is noticed promptly.
pub const DEFAULT_MAX_SLEEP_S: f32 = 0.040;

pub struct Scheduler<M: MemoryMap> {
    hw: HardwareScheduler<M>,
    pin_registry: PinRegistry,
    clock: Clock,
    shutdown_requested: Arc<AtomicBool>,
    short_interval_s: f32,
    wide_interval_s: f32,
    max_sleep_s: f32,
    ticks_since_wide: u32,
}

impl<M: MemoryMap> Scheduler<M> {
    pub fn new(mem: M, ring_frames: usize, pin_registry: PinRegistry) -> Result<Self, SchedulerError> {
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_requested))?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_requested))?;

        if let Err(err) = set_current_thread_priority(ThreadPriority::Max) {
            tracing::warn!(?err, "failed to raise scheduler thread to realtime priority, continuing at default priority");
        }

        Ok(Scheduler {
            hw: HardwareScheduler::new(mem, ring_frames),
            pin_registry,
            clock: Clock::new(),
            shutdown_requested,
            short_interval_s: DEFAULT_SHORT_INTERVAL_S,
            wide_interval_s: DEFAULT_WIDE_INTERVAL_S,
            max_sleep_s: DEFAULT_MAX_SLEEP_S,
            ticks_since_wide: 0,
        })
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn should_continue(&self) -> bool {
        !self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Requests shutdown as if a signal had been received — used by
    /// M112 (emergency stop) and M0 (program stop), which need the
    /// same ordered teardown a SIGINT/SIGTERM gets.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// The next idle-CPU interval to sleep for: `wide_interval_s` once
    /// every `WIDE_EVERY_N_SHORT` calls (or sooner if `force_wide` is
    /// set by a caller with slow-changing state to check), otherwise
    /// `short_interval_s`.
    pub fn next_idle_interval(&mut self, force_wide: bool) -> f32 {
        self.ticks_since_wide += 1;
        if force_wide || self.ticks_since_wide >= WIDE_EVERY_N_SHORT {
            self.ticks_since_wide = 0;
            self.wide_interval_s
        } else {
            self.short_interval_s
        }
    }

    pub fn sleep_until(&self, target: f64) {
        let continue_flag = &self.shutdown_requested;
        self.clock.sleep_until(target, self.max_sleep_s, || !continue_flag.load(Ordering::Relaxed));
    }

    /// Advances to the earliest time `event` can be placed in the DMA
    /// ring, sleeping as necessary, then queues it. Differs from a
    /// plain "sleep until fire time then write" because the hardware
    /// needs edges queued a bit *before* they fire, not queued and
    /// fired simultaneously.
    pub fn queue_event(&mut self, event: OutputEvent) -> Result<(), SchedulerError> {
        loop {
            let now = self.now();
            match self.hw.queue(event, now) {
                Ok(()) => return Ok(()),
                Err(hw_scheduler::SchedulerError::OutsideSchedulingWindow { requested, max, .. }) if requested > max => {
                    let wait_frames = (requested - max) as f64;
                    let wait_s = (wait_frames / FRAMES_PER_SEC).min(self.max_sleep_s as f64);
                    self.sleep_until(now + wait_s);
                    if !self.should_continue() {
                        return Ok(());
                    }
                }
                Err(hw_scheduler::SchedulerError::OutsideSchedulingWindow { min, .. }) => {
                    // The deadline already passed for a safe write (the
                    // DMA engine may already have played this frame).
                    // Recover by pushing the edge into the nearest
                    // future safe slot instead of dropping it.
                    tracing::warn!(
                        pin = event.pin,
                        "output event missed its scheduling window, rescheduling into the nearest safe slot"
                    );
                    let recovered = OutputEvent::new(self.hw.time_at_frame(min), event.pin, event.level);
                    return self.hw.queue(recovered, now).map_err(Into::into);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn sched_pwm(&mut self, pin: u8, duty: f32, max_period: f32) {
        let now = self.now();
        self.hw.queue_pwm(pin, duty, max_period, now);
    }

    pub fn check_time_origin_drift(&self) {
        self.hw.check_time_origin_drift();
    }

    /// Ordered shutdown: stop accepting new work, force every claimed
    /// pin back to its registered default level, then drop the
    /// hardware scheduler (which, with a real `DevMemMap`, unmaps the
    /// peripheral block). Consumes `self` so nothing can queue another
    /// event afterward.
    pub fn shutdown(mut self) {
        tracing::info!("shutting down: restoring pins to their default state");
        let now = self.now();
        for (pin, level) in self.pin_registry.drain_restores() {
            self.hw.force_pin(pin, level, now);
        }
    }
}

impl<M: MemoryMap> EdgeSink for Scheduler<M> {
    fn queue(&mut self, event: OutputEvent) {
        if let Err(err) = self.queue_event(event) {
            tracing::warn!(?err, pin = event.pin, "failed to schedule output event");
        }
    }

    fn queue_pwm(&mut self, pin: u8, duty: f32, max_period: f32) {
        self.sched_pwm(pin, duty, max_period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_scheduler::VecMemMap;

    fn scheduler() -> Scheduler<VecMemMap> {
        Scheduler::new(VecMemMap::new(8, 0x3f00_3000), 4096, PinRegistry::new()).unwrap()
    }

    #[test]
    fn wide_interval_is_forced_after_n_short_ticks() {
        let mut s = scheduler();
        let mut saw_wide = false;
        for _ in 0..WIDE_EVERY_N_SHORT {
            if s.next_idle_interval(false) == DEFAULT_WIDE_INTERVAL_S {
                saw_wide = true;
            }
        }
        assert!(saw_wide);
    }

    #[test]
    fn forced_wide_resets_the_short_tick_counter() {
        let mut s = scheduler();
        s.next_idle_interval(true);
        assert_eq!(s.ticks_since_wide, 0);
    }

    #[test]
    fn request_shutdown_stops_should_continue() {
        let s = scheduler();
        assert!(s.should_continue());
        s.request_shutdown();
        assert!(!s.should_continue());
    }

    #[test]
    fn queue_event_recovers_a_too_soon_deadline_instead_of_dropping_it() {
        let mut s = scheduler();
        let now = s.now();
        // An event timed for right now is inside MIN_SCHED_AHEAD_FRAME
        // of the current playback position: too soon to honor exactly,
        // but `queue_event` must still place it rather than error out.
        let event = OutputEvent::new(now, 5, true);
        assert!(s.queue_event(event).is_ok());
    }
}
