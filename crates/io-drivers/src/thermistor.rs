//! A two-pin RC thermistor reader: one pin drives a capacitor through
//! the thermistor's resistance, the other senses when it has charged
//! past the input's logic threshold. The charge time is proportional
//! to resistance, which `thermal::Beta` turns into a temperature —
//! without ever needing a real ADC.

use std::sync::Arc;

use thermal::{Beta, Thermistor};

use crate::driver::IoDriver;
use crate::error::DriverError;
use crate::event::{EdgeSink, OutputEvent, PinReader};
use crate::pin::IoPin;

/// Time to hold the drive pin low before starting a charge cycle, long
/// enough to fully discharge the capacitor between readings.
const DISCHARGE_TIME_S: f64 = 0.002;

/// If the sense pin hasn't gone high within this long after the drive
/// pin goes high, something's wrong (open thermistor, disconnected
/// capacitor) — discard the reading and start over.
const DEFAULT_READING_TIMEOUT_S: f64 = 0.5;

/// How much scheduling jitter a charge-time measurement can tolerate
/// before it's discarded rather than trusted. If the idle-CPU tick
/// that would have caught the sense pin going high was itself delayed
/// by more than this, the measured time doesn't actually reflect when
/// the pin went high.
pub const DEFAULT_MIN_TIMING_ACCURACY_S: f64 = 40e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Startup-only: running one extra discharge/charge cycle whose
    /// result is thrown away, so the first real reading isn't biased
    /// by whatever charge state the capacitor happened to power on in.
    Calibrating,
    Discharging { since: f64 },
    Charging { since: f64 },
}

pub struct RcThermistor {
    drive_pin: IoPin,
    sense_pin: u8,
    reader: Arc<dyn PinReader + Send + Sync>,
    model: Beta<f32>,
    /// Charge time per ohm of thermistor resistance, i.e. the
    /// capacitor's `C * ln(Vcc / (Vcc - Vthreshold))`. Converts a
    /// measured charge time directly to resistance without needing to
    /// model the capacitor and logic threshold separately.
    seconds_per_ohm: f32,
    reading_timeout_s: f64,
    min_timing_accuracy_s: f64,
    state: State,
    last_temperature: Option<f32>,
}

impl RcThermistor {
    pub fn new(
        drive_pin: IoPin,
        sense_pin: u8,
        reader: Arc<dyn PinReader + Send + Sync>,
        model: Beta<f32>,
        seconds_per_ohm: f32,
    ) -> Self {
        RcThermistor {
            drive_pin,
            sense_pin,
            reader,
            model,
            seconds_per_ohm,
            reading_timeout_s: DEFAULT_READING_TIMEOUT_S,
            min_timing_accuracy_s: DEFAULT_MIN_TIMING_ACCURACY_S,
            state: State::Calibrating,
            last_temperature: None,
        }
    }

    pub fn with_reading_timeout(mut self, timeout_s: f64) -> Self {
        self.reading_timeout_s = timeout_s;
        self
    }

    pub fn with_min_timing_accuracy(mut self, accuracy_s: f64) -> Self {
        self.min_timing_accuracy_s = accuracy_s;
        self
    }

    pub fn last_temperature(&self) -> Option<f32> {
        self.last_temperature
    }

    fn begin_discharge(&mut self, sink: &mut dyn EdgeSink, now: f64) {
        sink.queue(OutputEvent::new(now, self.drive_pin.pin_number(), self.drive_pin.logical_to_physical(false)));
        self.state = State::Discharging { since: now };
    }

    fn begin_charge(&mut self, sink: &mut dyn EdgeSink, now: f64) {
        sink.queue(OutputEvent::new(now, self.drive_pin.pin_number(), self.drive_pin.logical_to_physical(true)));
        self.state = State::Charging { since: now };
    }

    /// Converts an elapsed RC charge time into the synthetic ADC
    /// reading `Beta::adc_to_resistance` would have produced for the
    /// same resistance, letting the charge-time reading reuse the
    /// existing ADC-based equation instead of a parallel one.
    fn charge_time_to_temperature(&self, elapsed_s: f64) -> f32 {
        let resistance = elapsed_s as f32 / self.seconds_per_ohm;
        let synthetic_adc = self.model.series_resistance * self.model.adc_max / (self.model.series_resistance + resistance);
        self.model.adc_to_temperature(synthetic_adc)
    }

    /// Drives the Preparing (discharge) / Reading (charge-and-wait) /
    /// Calibrating state machine forward by one tick.
    pub fn tick(&mut self, sink: &mut dyn EdgeSink, now: f64) -> Result<(), DriverError> {
        match self.state {
            State::Calibrating => self.begin_discharge(sink, now),
            State::Discharging { since } => {
                if now - since >= DISCHARGE_TIME_S {
                    self.begin_charge(sink, now);
                }
            }
            State::Charging { since } => {
                let elapsed = now - since;
                if self.reader.read_digital(self.sense_pin) {
                    self.last_temperature = Some(self.charge_time_to_temperature(elapsed));
                    self.begin_discharge(sink, now);
                } else if elapsed >= self.reading_timeout_s {
                    self.begin_discharge(sink, now);
                    return Err(DriverError::ReadingTimeout(self.sense_pin, elapsed as f32));
                }
            }
        }
        Ok(())
    }
}

impl IoDriver for RcThermistor {
    fn get_measured_temperature(&self) -> Option<f32> {
        self.last_temperature
    }

    fn on_idle_cpu(&mut self, sink: &mut dyn EdgeSink, now: f64, interval: f32) -> bool {
        // A reading preempted by more than min_timing_accuracy isn't
        // trustworthy; restart the cycle rather than trust a charge
        // time that includes unknown scheduling delay.
        if (interval as f64) > self.min_timing_accuracy_s {
            if let State::Charging { .. } = self.state {
                self.state = State::Calibrating;
            }
        }
        if let Err(err) = self.tick(sink, now) {
            tracing::warn!(pin = self.sense_pin, %err, "discarding thermistor reading");
        }
        matches!(self.state, State::Charging { .. })
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

    struct FixedReader(bool);
    impl PinReader for FixedReader {
        fn read_digital(&self, _pin: u8) -> bool {
            self.0
        }
    }

    fn model() -> Beta<f32> {
        Beta::new(4700.0, 1023.0, 100_000.0, 298.15, 3950.0)
    }

    #[test]
    fn calibration_cycle_is_discarded_then_charge_completes() {
        let registry = PinRegistry::new();
        let drive_pin = registry.claim(5, false, false).unwrap();
        let reader: Arc<dyn PinReader + Send + Sync> = Arc::new(FixedReader(false));
        let mut thermistor = RcThermistor::new(drive_pin, 6, reader.clone(), model(), 1e-7);
        let mut sink = RecordingSink::default();

        thermistor.tick(&mut sink, 0.0).unwrap();
        assert!(matches!(thermistor.state, State::Discharging { .. }));

        thermistor.tick(&mut sink, 0.003).unwrap();
        assert!(matches!(thermistor.state, State::Charging { .. }));

        let reader: Arc<dyn PinReader + Send + Sync> = Arc::new(FixedReader(true));
        thermistor.reader = reader;
        thermistor.tick(&mut sink, 0.004).unwrap();
        assert!(thermistor.last_temperature().is_some());
    }

    #[test]
    fn timeout_without_sense_high_reports_error() {
        let registry = PinRegistry::new();
        let drive_pin = registry.claim(5, false, false).unwrap();
        let reader: Arc<dyn PinReader + Send + Sync> = Arc::new(FixedReader(false));
        let mut thermistor = RcThermistor::new(drive_pin, 6, reader, model(), 1e-7).with_reading_timeout(0.01);
        let mut sink = RecordingSink::default();

        thermistor.tick(&mut sink, 0.0).unwrap();
        thermistor.tick(&mut sink, 0.003).unwrap();
        let result = thermistor.tick(&mut sink, 0.02);
        assert!(result.is_err());
    }
}
