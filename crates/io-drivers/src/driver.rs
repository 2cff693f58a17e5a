//! The common surface every peripheral driver implements, plus the
//! tagged-enum dispatch ([`AnyIoDriver`]) used in place of `dyn
//! IoDriver` on the per-tick hot path, matching `motion`'s
//! `AnyAxisStepper` pattern: a handful of concrete variants known at
//! compile time beats a trait object when every variant is enumerable
//! and the dispatch happens every scheduler tick.
//!
//! Most methods are no-ops by default; a given driver overrides only
//! the handful that apply to it (a stepper overrides `step_forward`/
//! `step_backward` and ignores `is_fan`, a fan overrides `is_fan`/
//! `set_fan_duty` and ignores everything else).

use crate::event::EdgeSink;
use crate::endstop::EndstopDriver;
use crate::fan::FanDriver;
use crate::heater::HeaterDriver;
use crate::servo::ServoDriver;
use crate::stepper::StepDirStepper;
use crate::thermistor::RcThermistor;

pub trait IoDriver {
    fn step_forward(&mut self, _sink: &mut dyn EdgeSink, _time: f64) {}
    fn step_backward(&mut self, _sink: &mut dyn EdgeSink, _time: f64) {}

    fn is_fan(&self) -> bool {
        false
    }
    fn set_fan_duty(&mut self, _sink: &mut dyn EdgeSink, _duty: f32) {}

    fn set_target_temperature(&mut self, _celsius: f32) {}
    fn get_measured_temperature(&self) -> Option<f32> {
        None
    }

    fn is_endstop_triggered(&self) -> bool {
        false
    }

    fn set_servo_angle_degrees(&mut self, _sink: &mut dyn EdgeSink, _now: f64, _degrees: f32) {}

    /// Called by the scheduler on every idle-CPU tick (see SPEC_FULL
    /// §4.5's short/wide interval alternation). Returns whether this
    /// driver still has work pending that wants a shorter interval
    /// next time (e.g. a thermistor mid-charge).
    fn on_idle_cpu(&mut self, _sink: &mut dyn EdgeSink, _now: f64, _interval: f32) -> bool {
        false
    }
}

/// A compile-time-enumerable stand-in for `dyn IoDriver`.
pub enum AnyIoDriver {
    Stepper(StepDirStepper),
    Thermistor(RcThermistor),
    Heater(HeaterDriver),
    Endstop(EndstopDriver),
    Servo(ServoDriver),
    Fan(FanDriver),
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AnyIoDriver::Stepper(d) => d.$method($($arg),*),
            AnyIoDriver::Thermistor(d) => d.$method($($arg),*),
            AnyIoDriver::Heater(d) => d.$method($($arg),*),
            AnyIoDriver::Endstop(d) => d.$method($($arg),*),
            AnyIoDriver::Servo(d) => d.$method($($arg),*),
            AnyIoDriver::Fan(d) => d.$method($($arg),*),
        }
    };
}

impl IoDriver for AnyIoDriver {
    fn step_forward(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        dispatch!(self, step_forward, sink, time)
    }
    fn step_backward(&mut self, sink: &mut dyn EdgeSink, time: f64) {
        dispatch!(self, step_backward, sink, time)
    }
    fn is_fan(&self) -> bool {
        dispatch!(self, is_fan)
    }
    fn set_fan_duty(&mut self, sink: &mut dyn EdgeSink, duty: f32) {
        dispatch!(self, set_fan_duty, sink, duty)
    }
    fn set_target_temperature(&mut self, celsius: f32) {
        dispatch!(self, set_target_temperature, celsius)
    }
    fn get_measured_temperature(&self) -> Option<f32> {
        dispatch!(self, get_measured_temperature)
    }
    fn is_endstop_triggered(&self) -> bool {
        dispatch!(self, is_endstop_triggered)
    }
    fn set_servo_angle_degrees(&mut self, sink: &mut dyn EdgeSink, now: f64, degrees: f32) {
        dispatch!(self, set_servo_angle_degrees, sink, now, degrees)
    }
    fn on_idle_cpu(&mut self, sink: &mut dyn EdgeSink, now: f64, interval: f32) -> bool {
        dispatch!(self, on_idle_cpu, sink, now, interval)
    }
}
