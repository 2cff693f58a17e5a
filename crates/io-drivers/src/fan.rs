//! A PWM-driven cooling fan.

use crate::driver::IoDriver;
use crate::event::EdgeSink;
use crate::pin::IoPin;

/// Fan PWM period. Fast enough that the motor's inertia smooths it
/// into an effectively analog speed, slow enough not to compete with
/// stepper step pulses for scheduling slots.
pub const FAN_PWM_PERIOD_S: f32 = 0.01;

pub struct FanDriver {
    pin: IoPin,
    duty: f32,
}

impl FanDriver {
    pub fn new(pin: IoPin) -> Self {
        FanDriver { pin, duty: 0.0 }
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }
}

impl IoDriver for FanDriver {
    fn is_fan(&self) -> bool {
        true
    }

    fn set_fan_duty(&mut self, sink: &mut dyn EdgeSink, duty: f32) {
        self.duty = duty.clamp(0.0, 1.0);
        sink.queue_pwm(self.pin.pin_number(), self.duty, FAN_PWM_PERIOD_S);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OutputEvent;
    use crate::pin::PinRegistry;

    #[derive(Default)]
    struct RecordingSink {
        pwm_calls: Vec<(u8, f32, f32)>,
    }
    impl EdgeSink for RecordingSink {
        fn queue(&mut self, _event: OutputEvent) {}
        fn queue_pwm(&mut self, pin: u8, duty: f32, max_period: f32) {
            self.pwm_calls.push((pin, duty, max_period));
        }
    }

    #[test]
    fn s64_scaled_duty_matches_quarter_speed() {
        let registry = PinRegistry::new();
        let pin = registry.claim(2, false, false).unwrap();
        let mut fan = FanDriver::new(pin);
        let mut sink = RecordingSink::default();

        fan.set_fan_duty(&mut sink, 64.0 / 255.0);

        assert!((fan.duty() - 0.251).abs() < 0.001);
        assert_eq!(sink.pwm_calls[0].0, 2);
    }
}
