//! Scheduling-bound constants, carried over from the BCM2835 PWM/DMA
//! approach: a fixed-size ring of GPIO frames is played back by the
//! PWM peripheral's FIFO at a constant clock rate, and the DMA engine
//! copies each frame's GPSET0/GPCLR0 words out just ahead of when the
//! PWM FIFO consumes them.

/// Frames held in the ring buffer at once.
pub const SOURCE_BUFFER_FRAMES: usize = 65536;

/// The BCM2835's nominal PWM clock source frequency, in Hz.
pub const NOMINAL_CLOCK_FREQ: f64 = 500_000_000.0;

/// PWM bits consumed per output clock (one GPIO frame = one 32-bit
/// FIFO word's worth of clocks).
pub const BITS_PER_CLOCK: f64 = 10.0;

/// PWM clock divider.
pub const CLOCK_DIV: f64 = 200.0;

/// Frames played back per second of wall-clock time.
pub const FRAMES_PER_SEC: f64 = NOMINAL_CLOCK_FREQ / BITS_PER_CLOCK / CLOCK_DIV;

/// Frames ahead of the current playback position before which an edge
/// cannot safely be scheduled (the DMA engine might already have
/// copied that frame out).
pub const MIN_SCHED_AHEAD_FRAME: i64 = (SOURCE_BUFFER_FRAMES >> 8) as i64;

/// Frames ahead of the current playback position beyond which an edge
/// cannot be scheduled without risking the ring wrapping back around
/// to it before playback catches up.
pub const MAX_SCHED_AHEAD_FRAME: i64 = (SOURCE_BUFFER_FRAMES - (SOURCE_BUFFER_FRAMES >> 6)) as i64;
