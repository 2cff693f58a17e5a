/// Errors from mapping peripherals or scheduling edges onto the DMA ring.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `/dev/mem` couldn't be opened or mapped — almost always a
    /// permissions problem (needs root) or running on non-Pi hardware.
    /// The binary crate matches on this specifically to produce a
    /// clear top-level message before exiting.
    #[error("failed to map peripheral memory: {0}")]
    PeripheralMap(#[from] std::io::Error),
    /// An event's requested time falls outside
    /// `[MIN_SCHED_AHEAD_FRAME, MAX_SCHED_AHEAD_FRAME]` of the current
    /// playback position — too soon to guarantee the DMA engine hasn't
    /// already passed it, or far enough ahead that it would wrap the
    /// ring before being reached.
    #[error("event at frame {requested} is outside the schedulable window [{min}, {max}]")]
    OutsideSchedulingWindow { requested: i64, min: i64, max: i64 },
}
