//! A digital endstop/limit-switch input, read through a [`PinReader`]
//! rather than owned directly — unlike output pins, an input pin's
//! "ownership" is really just a claim on the pin number, since nothing
//! ever schedules a write to it. The reader is shared (the same
//! memory-mapped GPIO register backs every input pin on the machine),
//! hence `Arc` rather than a borrow — a borrow would tie `EndstopDriver`
//! to a lifetime that the tagged `AnyIoDriver` enum has no room for.

use std::sync::Arc;

use crate::driver::IoDriver;
use crate::event::PinReader;
use crate::pin::IoPin;

pub struct EndstopDriver {
    sense_pin: IoPin,
    reader: Arc<dyn PinReader + Send + Sync>,
}

impl EndstopDriver {
    pub fn new(sense_pin: IoPin, reader: Arc<dyn PinReader + Send + Sync>) -> Self {
        EndstopDriver { sense_pin, reader }
    }
}

impl IoDriver for EndstopDriver {
    fn is_endstop_triggered(&self) -> bool {
        self.sense_pin.logical_to_physical(self.reader.read_digital(self.sense_pin.pin_number()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinRegistry;

    struct FixedReader(bool);
    impl PinReader for FixedReader {
        fn read_digital(&self, _pin: u8) -> bool {
            self.0
        }
    }

    #[test]
    fn inverted_endstop_flips_triggered_sense() {
        let registry = PinRegistry::new();
        let pin = registry.claim(4, true, false).unwrap();
        let reader: Arc<dyn PinReader + Send + Sync> = Arc::new(FixedReader(false));
        let endstop = EndstopDriver::new(pin, reader);
        assert!(endstop.is_endstop_triggered());
    }
}
