//! A STEP/DIR/ENABLE stepper driver (DRV8825, A4988, and compatible
//! "step-and-direction" chips), expanded into scheduled edges rather
//! than immediate pin writes.

use crate::event::EdgeSink;
use crate::pin::IoPin;

/// Minimum STEP pulse width most step/dir drivers require, in seconds.
pub const STEP_PULSE_WIDTH_S: f64 = 8e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastDirection {
    Unknown,
    Forward,
    Backward,
}

pub struct StepDirStepper {
    step_pin: IoPin,
    dir_pin: IoPin,
    enable_pin: Option<IoPin>,
    last_direction: LastDirection,
}

impl StepDirStepper {
    pub fn new(step_pin: IoPin, dir_pin: IoPin, enable_pin: Option<IoPin>) -> Self {
        StepDirStepper {
            step_pin,
            dir_pin,
            enable_pin,
            last_direction: LastDirection::Unknown,
        }
    }

    pub fn enable(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        if let Some(enable_pin) = &self.enable_pin {
            sink.queue(crate::event::OutputEvent::new(time, enable_pin.pin_number(), enable_pin.logical_to_physical(true)));
        }
    }

    pub fn disable(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        if let Some(enable_pin) = &self.enable_pin {
            sink.queue(crate::event::OutputEvent::new(time, enable_pin.pin_number(), enable_pin.logical_to_physical(false)));
        }
    }

    fn step(&mut self, sink: &mut dyn EdgeSink, time: f64, direction: LastDirection) {
        if self.last_direction != direction {
            let forward = direction == LastDirection::Forward;
            sink.queue(crate::event::OutputEvent::new(time, self.dir_pin.pin_number(), self.dir_pin.logical_to_physical(forward)));
            self.last_direction = direction;
        }
        sink.queue(crate::event::OutputEvent::new(time, self.step_pin.pin_number(), self.step_pin.logical_to_physical(true)));
        sink.queue(crate::event::OutputEvent::new(
            time + STEP_PULSE_WIDTH_S,
            self.step_pin.pin_number(),
            self.step_pin.logical_to_physical(false),
        ));
    }
}

impl super::IoDriver for StepDirStepper {
    fn step_forward(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        self.step(sink, time, LastDirection::Forward);
    }

    fn step_backward(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        self.step(sink, time, LastDirection::Backward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OutputEvent;
    use crate::pin::PinRegistry;
    use crate::driver::IoDriver;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<OutputEvent>,
    }
    impl EdgeSink for RecordingSink {
        fn queue(&mut self, event: OutputEvent) {
            self.events.push(event);
        }
        fn queue_pwm(&mut self, _pin: u8, _duty: f32, _max_period: f32) {}
    }

    #[test]
    fn first_step_emits_dir_and_pulse_edges() {
        let registry = PinRegistry::new();
        let step_pin = registry.claim(10, false, false).unwrap();
        let dir_pin = registry.claim(11, false, false).unwrap();
        let mut stepper = StepDirStepper::new(step_pin, dir_pin, None);
        let mut sink = RecordingSink::default();

        stepper.step_forward(&mut sink, 1.0);

        assert_eq!(sink.events.len(), 3);
        assert_eq!(sink.events[0], OutputEvent::new(1.0, 11, true));
        assert_eq!(sink.events[1], OutputEvent::new(1.0, 10, true));
        assert_eq!(sink.events[2], OutputEvent::new(1.0 + STEP_PULSE_WIDTH_S, 10, false));
    }

    #[test]
    fn repeated_same_direction_step_skips_redundant_dir_write() {
        let registry = PinRegistry::new();
        let step_pin = registry.claim(10, false, false).unwrap();
        let dir_pin = registry.claim(11, false, false).unwrap();
        let mut stepper = StepDirStepper::new(step_pin, dir_pin, None);
        let mut sink = RecordingSink::default();

        stepper.step_forward(&mut sink, 1.0);
        stepper.step_forward(&mut sink, 2.0);

        assert_eq!(sink.events.len(), 5);
    }
}
