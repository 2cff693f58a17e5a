/// Errors produced while claiming pins or driving peripherals.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DriverError {
    /// Two drivers tried to claim the same physical pin number.
    #[error("pin {0} is already claimed")]
    PinAlreadyClaimed(u8),
    /// A thermistor's RC charge time exceeded its configured ceiling
    /// without the sense pin going high (open circuit, or the
    /// capacitor never reached the logic threshold).
    #[error("thermistor reading on pin {0} timed out after {1}s")]
    ReadingTimeout(u8, f32),
}
