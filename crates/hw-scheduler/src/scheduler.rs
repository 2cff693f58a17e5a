//! Schedules [`OutputEvent`]s onto a fixed-size ring of
//! [`GpioBufferFrame`]s, playing the role the BCM2835 DMA/PWM engine
//! plays in the original firmware. [`VecMemMap`](crate::memory_map::VecMemMap)
//! lets every test here assert on ring contents without hardware;
//! [`DevMemMap`](crate::memory_map::DevMemMap) is read through for the
//! system timer that anchors `frame0_time`. Actually playing this ring
//! out to GPIO via a real PWM-paced DMA chain is the one piece of
//! hardware bring-up this crate doesn't implement — see SPEC_FULL.md
//! §4.6's "Scope note: real DMA/PWM bring-up".
//!
//! Unlike the original's static, globally-accessible scheduler
//! singleton, [`HardwareScheduler`] is an explicitly owned value: its
//! single owner is `scheduler::Scheduler`, which is itself the single
//! owner of the whole hardware-facing half of the binary. Rust's
//! ownership makes that pattern free to express without reaching for
//! `static`/`OnceLock` the way a C++ singleton would.

use io_drivers::OutputEvent;

use crate::constants::{FRAMES_PER_SEC, MAX_SCHED_AHEAD_FRAME, MIN_SCHED_AHEAD_FRAME};
use crate::error::SchedulerError;
use crate::memory_map::MemoryMap;
use crate::ring::{GpioBufferFrame, PwmHeader};

/// Word offset of the BCM2835 free-running system timer's low 32 bits
/// within the peripheral block this scheduler maps.
const SYSTEM_TIMER_CLO_WORD: usize = 1;
/// Word offset of the timer's high 32 bits.
const SYSTEM_TIMER_CHI_WORD: usize = 2;

/// A dual read of the system timer disagreeing by more than this
/// suggests a torn 64-bit read straddling a CLO→CHI carry, or enough
/// scheduling jitter between the two reads to not trust the result.
const MAX_TIMER_READ_DISAGREEMENT_S: f64 = 20e-6;

pub struct HardwareScheduler<M: MemoryMap> {
    mem: M,
    ring: Vec<GpioBufferFrame>,
    pwm_header: PwmHeader,
    /// Wall-clock time (seconds) corresponding to frame 0, established
    /// once at construction from the hardware system timer.
    frame0_time: f64,
}

impl<M: MemoryMap> HardwareScheduler<M> {
    pub fn new(mem: M, ring_frames: usize) -> Self {
        let mut scheduler = HardwareScheduler {
            mem,
            ring: vec![GpioBufferFrame::default(); ring_frames],
            pwm_header: PwmHeader::default(),
            frame0_time: 0.0,
        };
        scheduler.frame0_time = scheduler.read_system_time();
        scheduler
    }

    pub fn pwm_header(&self) -> PwmHeader {
        self.pwm_header
    }

    fn read_system_time(&self) -> f64 {
        let lo = self.mem.read_u32(SYSTEM_TIMER_CLO_WORD) as u64;
        let hi = self.mem.read_u32(SYSTEM_TIMER_CHI_WORD) as u64;
        ((hi << 32) | lo) as f64 / 1_000_000.0
    }

    /// Re-reads the hardware timer and warns (but does not panic or
    /// reset the origin) if it disagrees with what a second read, or
    /// the frame-0 origin established at construction, predicts. Meant
    /// to be called periodically from the wide idle-CPU interval, not
    /// every tick.
    pub fn check_time_origin_drift(&self) {
        let first = self.read_system_time();
        let second = self.read_system_time();
        if (second - first).abs() > MAX_TIMER_READ_DISAGREEMENT_S {
            tracing::warn!(first, second, "system timer dual-read disagreement");
        }
        if (first - self.frame0_time).abs() > MAX_TIMER_READ_DISAGREEMENT_S {
            tracing::warn!(drift_s = first - self.frame0_time, "hardware scheduler time-at-frame-0 drift");
        }
    }

    /// Converts an absolute wall-clock time to a ring frame index.
    pub fn sched_time(&self, event_time: f64) -> i64 {
        ((event_time - self.frame0_time) * FRAMES_PER_SEC).round() as i64
    }

    /// Inverse of [`sched_time`](Self::sched_time): the wall-clock time
    /// at which ring frame `frame` plays back. Used to recover a
    /// missed deadline into the nearest still-schedulable frame rather
    /// than dropping the edge.
    pub fn time_at_frame(&self, frame: i64) -> f64 {
        self.frame0_time + frame as f64 / FRAMES_PER_SEC
    }

    fn ring_slot(&self, frame: i64) -> usize {
        frame.rem_euclid(self.ring.len() as i64) as usize
    }

    /// Schedules a single pin transition. `now` is the caller's
    /// current wall-clock time, used to check the event isn't too soon
    /// or too far ahead of the ring's current playback position.
    pub fn queue(&mut self, event: OutputEvent, now: f64) -> Result<(), SchedulerError> {
        let frame = self.sched_time(event.time);
        let current = self.sched_time(now);
        let ahead = frame - current;
        if !(MIN_SCHED_AHEAD_FRAME..=MAX_SCHED_AHEAD_FRAME).contains(&ahead) {
            return Err(SchedulerError::OutsideSchedulingWindow {
                requested: frame,
                min: current + MIN_SCHED_AHEAD_FRAME,
                max: current + MAX_SCHED_AHEAD_FRAME,
            });
        }
        let slot = self.ring_slot(frame);
        self.ring[slot].set_pin(event.pin, event.level);
        Ok(())
    }

    /// Expands one period of a square wave starting just past the
    /// minimum schedulable horizon, with duty cycle `duty` (0.0-1.0)
    /// and period capped at `max_period` seconds. Drivers that want a
    /// continuously running PWM (fans, heaters) call this again every
    /// idle-CPU tick rather than expecting one call to repeat forever.
    pub fn queue_pwm(&mut self, pin: u8, duty: f32, max_period: f32, now: f64) {
        let period_frames = ((max_period as f64) * FRAMES_PER_SEC).max(2.0) as i64;
        let period_frames = period_frames.min(self.ring.len() as i64);
        let high_frames = (duty.clamp(0.0, 1.0) as f64 * period_frames as f64).round() as i64;
        let base = self.sched_time(now) + MIN_SCHED_AHEAD_FRAME;
        for offset in 0..period_frames {
            let slot = self.ring_slot(base + offset);
            self.ring[slot].set_pin(pin, offset < high_frames);
        }
    }

    pub fn frame_at(&self, frame: i64) -> GpioBufferFrame {
        self.ring[self.ring_slot(frame)]
    }

    /// Writes a pin level at the nearest schedulable frame, bypassing
    /// the normal min/max scheduling-window check. Used only for
    /// exit-time pin restoration, where the scheduler is shutting down
    /// and there's no "too soon" to worry about.
    pub fn force_pin(&mut self, pin: u8, level: bool, now: f64) {
        let frame = self.sched_time(now) + MIN_SCHED_AHEAD_FRAME;
        let slot = self.ring_slot(frame);
        self.ring[slot].set_pin(pin, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::VecMemMap;

    fn scheduler() -> HardwareScheduler<VecMemMap> {
        HardwareScheduler::new(VecMemMap::new(8, 0x3f00_3000), 4096)
    }

    #[test]
    fn queue_sets_the_right_ring_slot() {
        let mut hw = scheduler();
        let frame = hw.sched_time(hw.frame0_time) + MIN_SCHED_AHEAD_FRAME + 10;
        let time = hw.frame0_time + frame as f64 / FRAMES_PER_SEC;
        hw.queue(OutputEvent::new(time, 5, true), hw.frame0_time).unwrap();
        assert!(hw.frame_at(frame).gpset0 & (1 << 5) != 0);
    }

    #[test]
    fn queue_too_soon_is_rejected() {
        let mut hw = scheduler();
        let now = hw.frame0_time;
        let time = now; // frame 0 ahead of "now" frame 0: zero lead time
        let result = hw.queue(OutputEvent::new(time, 5, true), now);
        assert!(result.is_err());
    }

    #[test]
    fn queue_pwm_produces_a_duty_cycle_within_one_frame() {
        let mut hw = scheduler();
        let now = hw.frame0_time;
        hw.queue_pwm(2, 0.5, 0.00002, now); // small period -> few frames
        let base = hw.sched_time(now) + MIN_SCHED_AHEAD_FRAME;
        let high = hw.frame_at(base).gpset0 & (1 << 2) != 0;
        assert!(high);
    }
}
