/// Errors produced while planning or stepping a motion segment.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MotionError {
    /// The target is outside the machine's kinematic reach.
    #[error(transparent)]
    Unreachable(#[from] coordmap::CoordMapError),
    /// A move or arc was requested with a feed rate of zero or less.
    #[error("feed rate must be positive, got {0}")]
    InvalidFeedRate(f32),
    /// An arc's radius did not agree between its start and end points
    /// within tolerance.
    #[error("arc radius mismatch: start implies {0}mm, end implies {1}mm")]
    ArcRadiusMismatch(f32, f32),
}
