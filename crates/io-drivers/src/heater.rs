//! A PID-controlled heater, wired up to `thermal`'s safety monitor so a
//! thermal-runaway condition forces the output off regardless of what
//! the PID loop would otherwise compute. Not excluded by any Non-goal:
//! a heater that can't detect a disconnected thermistor or a stuck-on
//! element is a fire hazard, not a simplification.

use thermal::{HeaterSafety, Pid, SafetyLimits, ThermalState};

use crate::driver::IoDriver;
use crate::event::EdgeSink;
use crate::pin::IoPin;

/// Heater PWM period. Slow relative to a stepper's microsecond-scale
/// pulses, since heater elements have too much thermal mass to care
/// about anything faster.
pub const HEATER_PWM_PERIOD_S: f32 = 1.0;

pub struct HeaterDriver {
    pwm_pin: IoPin,
    pid: Pid<f32>,
    safety: HeaterSafety<f32>,
    measured_temperature: f32,
    state: ThermalState,
    last_duty: f32,
}

impl HeaterDriver {
    pub fn new(pwm_pin: IoPin, pid: Pid<f32>, limits: SafetyLimits<f32>) -> Self {
        HeaterDriver {
            pwm_pin,
            pid,
            safety: HeaterSafety::new(limits),
            measured_temperature: -300.0,
            state: ThermalState::Ok,
            last_duty: 0.0,
        }
    }

    /// Feeds in the latest reading from this heater's paired
    /// thermistor driver. The two are separate `IoDriver`s (a
    /// thermistor can exist without a heater, e.g. a chamber sensor),
    /// so the machine wiring is responsible for calling this each
    /// cycle with whatever the thermistor last reported.
    pub fn report_temperature(&mut self, celsius: f32) {
        self.measured_temperature = celsius;
    }

    pub fn state(&self) -> ThermalState {
        self.state
    }
}

impl IoDriver for HeaterDriver {
    fn set_target_temperature(&mut self, celsius: f32) {
        self.pid.setpoint = celsius;
    }

    fn get_measured_temperature(&self) -> Option<f32> {
        Some(self.measured_temperature)
    }

    fn on_idle_cpu(&mut self, sink: &mut dyn EdgeSink, now: f64, interval: f32) -> bool {
        self.state = self.safety.update(now as f32, self.measured_temperature, self.pid.setpoint, self.last_duty > 0.0);

        let duty = if self.state == ThermalState::Shutdown {
            tracing::error!(pin = self.pwm_pin.pin_number(), temperature = self.measured_temperature, "heater safety shutdown: forcing duty to 0");
            self.pid.reset();
            0.0
        } else {
            self.pid.update(self.measured_temperature, interval)
        };

        self.last_duty = duty;
        sink.queue_pwm(self.pwm_pin.pin_number(), duty.max(0.0), HEATER_PWM_PERIOD_S);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OutputEvent;
    use crate::pin::PinRegistry;

    #[derive(Default)]
    struct NullSink;
    impl EdgeSink for NullSink {
        fn queue(&mut self, _event: OutputEvent) {}
        fn queue_pwm(&mut self, _pin: u8, _duty: f32, _max_period: f32) {}
    }

    fn limits() -> SafetyLimits<f32> {
        SafetyLimits { max_temp: 280.0, min_heat_gain_temp: 2.0, min_heat_gain_time_s: 30.0, max_deviation: 5.0 }
    }

    #[test]
    fn runaway_temperature_forces_shutdown() {
        let registry = PinRegistry::new();
        let pin = registry.claim(9, false, false).unwrap();
        let mut heater = HeaterDriver::new(pin, Pid::new(1.0, 0.0, 0.0, 200.0, 0.0, 1.0), limits());
        let mut sink = NullSink::default();

        heater.report_temperature(300.0);
        heater.on_idle_cpu(&mut sink, 0.0, 1.0);
        assert_eq!(heater.state(), ThermalState::Shutdown);
    }

    #[test]
    fn below_limit_runs_pid_normally() {
        let registry = PinRegistry::new();
        let pin = registry.claim(9, false, false).unwrap();
        let mut heater = HeaterDriver::new(pin, Pid::new(0.5, 0.0, 0.0, 200.0, 0.0, 1.0), limits());
        let mut sink = NullSink::default();

        heater.set_target_temperature(200.0);
        heater.report_temperature(20.0);
        heater.on_idle_cpu(&mut sink, 0.0, 1.0);
        assert_ne!(heater.state(), ThermalState::Shutdown);
    }
}
