//! Pin ownership and concrete peripheral drivers.
//!
//! A driver never touches hardware directly: it describes pin
//! transitions as [`OutputEvent`]s handed to whatever implements
//! [`EdgeSink`] (the `scheduler` crate, in the shipped binary; an
//! in-memory recorder in tests). That keeps this crate runnable on any
//! host, with the Raspberry Pi-specific memory-mapped I/O confined to
//! `hw-scheduler`.

pub mod driver;
pub mod endstop;
pub mod error;
pub mod event;
pub mod fan;
pub mod heater;
pub mod pin;
pub mod servo;
pub mod stepper;
pub mod thermistor;

pub use driver::{AnyIoDriver, IoDriver};
pub use endstop::EndstopDriver;
pub use error::DriverError;
pub use event::{EdgeSink, OutputEvent, PinReader};
pub use fan::FanDriver;
pub use heater::HeaterDriver;
pub use pin::{IoPin, PinRegistry};
pub use servo::ServoDriver;
pub use stepper::StepDirStepper;
pub use thermistor::RcThermistor;
