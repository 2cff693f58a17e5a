//! The machine description: everything that varies between printers
//! and nothing that varies between G-code dialects. Shaped after the
//! original firmware's `Machine` interface (`getIoDrivers`,
//! `getCoordMap`, `getAxisSteppers`, `defaultMoveRate`, ...) but
//! expressed as a Rust trait plus a bundle of already-constructed
//! drivers rather than a virtual C++ base class, since every driver
//! this workspace ships is already enumerable in [`AnyIoDriver`].
//!
//! Only one concrete machine ships here: a plain Cartesian printer
//! with made-up-but-plausible pin numbers and thermal constants. A
//! real deployment swaps this module out for its own wiring; nothing
//! elsewhere in the crate assumes Cartesian kinematics specifically.

use std::sync::Arc;

use coordmap::Cartesian;
use io_drivers::{
    AnyIoDriver, DriverError, EndstopDriver, FanDriver, HeaterDriver, PinReader, PinRegistry,
    RcThermistor, ServoDriver, StepDirStepper,
};
use motion::{axis_stepper::StepDirection, Kinematics};
use thermal::{Beta, Pid, SafetyLimits};

/// The drivers a machine builds, plus enough indices into them for the
/// state machine to address "the X stepper" or "the hotend heater"
/// without caring where in the vector it happens to live.
pub struct MachineIo {
    pub drivers: Vec<AnyIoDriver>,
    /// Indices for X, Y, Z, and the extruder, in that order — matches
    /// `motion::StepEvent::axis`'s numbering.
    pub stepper_index: [usize; 4],
    pub endstop_index: [Option<usize>; 3],
    pub fan_index: Option<usize>,
    pub hotend_heater_index: usize,
    pub hotend_thermistor_index: usize,
    pub bed_heater_index: Option<usize>,
    pub bed_thermistor_index: Option<usize>,
    pub servo_index: Option<usize>,
}

/// Everything the state machine needs to know about the physical
/// printer it's driving, independent of G-code semantics.
pub trait Machine {
    fn kinematics(&self) -> Kinematics;
    fn steps_per_mm_e(&self) -> f32;
    fn max_extrusion_rate(&self) -> f32;
    fn max_accel(&self) -> f32;
    fn default_feed_rate_mm_s(&self) -> f32;
    fn homing_feed_rate_mm_s(&self) -> f32;
    fn homing_direction(&self, axis: usize) -> StepDirection;

    /// Builds every `IoDriver` this machine owns, claiming pins out of
    /// `pins` and reading endstop/thermistor sense pins through
    /// `reader`.
    fn build_io(
        &self,
        pins: &PinRegistry,
        reader: Arc<dyn PinReader + Send + Sync>,
    ) -> Result<MachineIo, DriverError>;
}

/// A plain Cartesian printer: one stepper per mechanical axis plus the
/// extruder, X/Y/Z endstops, a hotend and bed heater each with an RC
/// thermistor, a part-cooling fan, and a single accessory servo (e.g.
/// a probe deploy arm). Pin numbers, steps/mm, and thermal constants
/// are representative defaults, not any specific board's wiring.
pub struct GenericCartesianMachine;

impl Machine for GenericCartesianMachine {
    fn kinematics(&self) -> Kinematics {
        Kinematics::Cartesian(
            Cartesian::new([80.0, 80.0, 400.0])
                .with_bounds(coordmap::Vector3::ZERO, coordmap::Vector3::new(200.0, 200.0, 200.0)),
        )
    }

    fn steps_per_mm_e(&self) -> f32 {
        400.0
    }

    fn max_extrusion_rate(&self) -> f32 {
        300.0
    }

    fn max_accel(&self) -> f32 {
        800.0
    }

    fn default_feed_rate_mm_s(&self) -> f32 {
        50.0
    }

    fn homing_feed_rate_mm_s(&self) -> f32 {
        20.0
    }

    fn homing_direction(&self, _axis: usize) -> StepDirection {
        // Every axis's home position is step 0 (Cartesian::home_position),
        // so homing always drives toward decreasing step count.
        StepDirection::Negative
    }

    fn build_io(
        &self,
        pins: &PinRegistry,
        reader: Arc<dyn PinReader + Send + Sync>,
    ) -> Result<MachineIo, DriverError> {
        let mut drivers = Vec::new();

        let mut stepper = |step: u8, dir: u8, enable: u8| -> Result<usize, DriverError> {
            let step_pin = pins.claim(step, false, false)?;
            let dir_pin = pins.claim(dir, false, false)?;
            let enable_pin = pins.claim(enable, true, true)?;
            drivers.push(AnyIoDriver::Stepper(StepDirStepper::new(step_pin, dir_pin, Some(enable_pin))));
            Ok(drivers.len() - 1)
        };
        let x = stepper(2, 3, 4)?;
        let y = stepper(5, 6, 7)?;
        let z = stepper(8, 9, 10)?;
        let e = stepper(11, 12, 13)?;

        let mut endstop = |sense: u8| -> Result<usize, DriverError> {
            let sense_pin = pins.claim(sense, false, false)?;
            drivers.push(AnyIoDriver::Endstop(EndstopDriver::new(sense_pin, reader.clone())));
            Ok(drivers.len() - 1)
        };
        let endstop_x = endstop(14)?;
        let endstop_y = endstop(15)?;
        let endstop_z = endstop(16)?;

        let fan_pin = pins.claim(17, false, false)?;
        drivers.push(AnyIoDriver::Fan(FanDriver::new(fan_pin)));
        let fan_index = drivers.len() - 1;

        let hotend_heater_pin = pins.claim(18, false, false)?;
        drivers.push(AnyIoDriver::Heater(HeaterDriver::new(
            hotend_heater_pin,
            Pid::new(0.3, 0.02, 0.4, 0.0, 0.0, 1.0),
            SafetyLimits { max_temp: 285.0, min_heat_gain_temp: 2.0, min_heat_gain_time_s: 30.0, max_deviation: 10.0 },
        )));
        let hotend_heater_index = drivers.len() - 1;

        let hotend_drive_pin = pins.claim(19, false, false)?;
        drivers.push(AnyIoDriver::Thermistor(RcThermistor::new(
            hotend_drive_pin,
            20,
            reader.clone(),
            Beta::new(4700.0, 1023.0, 100_000.0, 298.15, 3950.0),
            1e-7,
        )));
        let hotend_thermistor_index = drivers.len() - 1;

        let bed_heater_pin = pins.claim(21, false, false)?;
        drivers.push(AnyIoDriver::Heater(HeaterDriver::new(
            bed_heater_pin,
            Pid::new(0.6, 0.01, 0.2, 0.0, 0.0, 1.0),
            SafetyLimits { max_temp: 150.0, min_heat_gain_temp: 1.0, min_heat_gain_time_s: 60.0, max_deviation: 10.0 },
        )));
        let bed_heater_index = drivers.len() - 1;

        let bed_drive_pin = pins.claim(22, false, false)?;
        drivers.push(AnyIoDriver::Thermistor(RcThermistor::new(
            bed_drive_pin,
            23,
            reader.clone(),
            Beta::new(4700.0, 1023.0, 100_000.0, 298.15, 3950.0),
            1e-7,
        )));
        let bed_thermistor_index = drivers.len() - 1;

        let servo_pin = pins.claim(24, false, false)?;
        drivers.push(AnyIoDriver::Servo(ServoDriver::new(servo_pin)));
        let servo_index = drivers.len() - 1;

        Ok(MachineIo {
            drivers,
            stepper_index: [x, y, z, e],
            endstop_index: [Some(endstop_x), Some(endstop_y), Some(endstop_z)],
            fan_index: Some(fan_index),
            hotend_heater_index,
            hotend_thermistor_index,
            bed_heater_index: Some(bed_heater_index),
            bed_thermistor_index: Some(bed_thermistor_index),
            servo_index: Some(servo_index),
        })
    }
}
