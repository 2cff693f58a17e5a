//! The currency between a driver and whatever owns real (or simulated)
//! hardware time: drivers never write to a pin directly, they describe
//! *when* a pin should change and hand that off to an [`EdgeSink`].
//! This keeps `io-drivers` ignorant of DMA, memory-mapped registers,
//! or any particular clock source.

/// A single pin transition scheduled for an absolute point in time
/// (seconds since the scheduler's epoch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputEvent {
    pub time: f64,
    pub pin: u8,
    pub level: bool,
}

impl OutputEvent {
    pub fn new(time: f64, pin: u8, level: bool) -> Self {
        OutputEvent { time, pin, level }
    }
}

/// Where a driver sends the edges it wants produced. Implemented by
/// the scheduler; drivers only ever see this trait, never a concrete
/// hardware handle.
pub trait EdgeSink {
    fn queue(&mut self, event: OutputEvent);

    /// A repeating square wave on `pin` starting now, with the given
    /// duty cycle (0.0-1.0) and period capped at `max_period` seconds.
    /// Implemented in terms of `queue` by most sinks, but kept as its
    /// own method so a hardware scheduler backed by a real PWM
    /// peripheral (see `hw-scheduler`) can route it there directly
    /// instead of expanding it into discrete edges.
    fn queue_pwm(&mut self, pin: u8, duty: f32, max_period: f32);
}

/// Where a driver reads the instantaneous state of an input pin. Kept
/// separate from `EdgeSink` because writing is scheduled ahead of time
/// while reading is always "now" — on real hardware this is a direct
/// memory-mapped GPIO level register read.
pub trait PinReader {
    fn read_digital(&self, pin: u8) -> bool;
}
