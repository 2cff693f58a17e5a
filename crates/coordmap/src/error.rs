/// Errors produced while mapping between Cartesian space and axis
/// (microstep) space.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoordMapError {
    /// The requested Cartesian point cannot be reached by this
    /// kinematic's geometry (e.g. outside a delta's reachable sphere,
    /// or a rotary arm angle outside its physical range).
    #[error("cartesian point ({0}, {1}, {2}) is not reachable by this kinematic")]
    Unreachable(f32, f32, f32),
}
