//! A hobby servo driven by a ~20ms-period pulse whose width (typically
//! 1-2ms) encodes the commanded angle. Expressed as two `OutputEvent`s
//! per cycle (rising edge, then the falling edge at the pulse width)
//! rather than a duty-cycle PWM, since servo pulse width is an
//! absolute quantity, not a fraction of the period.

use crate::driver::IoDriver;
use crate::event::{EdgeSink, OutputEvent};
use crate::pin::IoPin;

pub const SERVO_PERIOD_S: f64 = 0.02;
pub const MIN_PULSE_WIDTH_S: f64 = 0.001;
pub const MAX_PULSE_WIDTH_S: f64 = 0.002;

pub struct ServoDriver {
    pin: IoPin,
    angle_degrees: f32,
    last_pulse_time: Option<f64>,
}

impl ServoDriver {
    pub fn new(pin: IoPin) -> Self {
        ServoDriver { pin, angle_degrees: 0.0, last_pulse_time: None }
    }

    fn pulse_width_s(&self) -> f64 {
        let fraction = (self.angle_degrees / 180.0).clamp(0.0, 1.0) as f64;
        MIN_PULSE_WIDTH_S + fraction * (MAX_PULSE_WIDTH_S - MIN_PULSE_WIDTH_S)
    }

    fn fire_pulse(&mut self, sink: &mut dyn EdgeSink, now: f64) {
        let pulse_width = self.pulse_width_s();
        sink.queue(OutputEvent::new(now, self.pin.pin_number(), self.pin.logical_to_physical(true)));
        sink.queue(OutputEvent::new(now + pulse_width, self.pin.pin_number(), self.pin.logical_to_physical(false)));
        self.last_pulse_time = Some(now);
    }
}

impl IoDriver for ServoDriver {
    fn set_servo_angle_degrees(&mut self, sink: &mut dyn EdgeSink, now: f64, degrees: f32) {
        self.angle_degrees = degrees;
        self.fire_pulse(sink, now);
    }

    /// Re-fires the pulse once per `SERVO_PERIOD_S`, independent of how
    /// often the idle-CPU tick itself runs.
    fn on_idle_cpu(&mut self, sink: &mut dyn EdgeSink, now: f64, _interval: f32) -> bool {
        let due = self.last_pulse_time.map_or(true, |since| now - since >= SERVO_PERIOD_S);
        if due {
            self.fire_pulse(sink, now);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinRegistry;

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
    fn max_angle_yields_max_pulse_width() {
        let registry = PinRegistry::new();
        let pin = registry.claim(8, false, false).unwrap();
        let mut servo = ServoDriver::new(pin);
        let mut sink = RecordingSink::default();

        servo.set_servo_angle_degrees(&mut sink, 0.0, 180.0);

        assert_eq!(sink.events.len(), 2);
        let width = sink.events[1].time - sink.events[0].time;
        assert!((width - MAX_PULSE_WIDTH_S).abs() < 1e-9);
    }
}
