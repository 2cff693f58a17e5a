//! Exclusive pin ownership and exit-time default-state restoration.
//!
//! A physical pin number must never be claimed by two drivers at once
//! — that's how a stepper's DIR line and a fan's PWM line end up
//! fighting over the same wire. [`PinRegistry`] enforces that, and
//! remembers each pin's configured "default" (safe, de-energized)
//! level so the scheduler's exit handler can restore every pin to it
//! without needing to know what kind of driver was using it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::DriverError;

#[derive(Default)]
struct RegistryInner {
    claimed: HashSet<u8>,
    /// (pin, level) pairs queued for exit-time restoration, most
    /// recent claim last.
    restore_log: Vec<(u8, bool)>,
}

/// Process-wide record of which pin numbers are in use. One instance
/// is shared (via `Clone`, which is cheap — it's an `Arc`) between
/// every driver a machine constructs.
#[derive(Clone, Default)]
pub struct PinRegistry(Arc<Mutex<RegistryInner>>);

impl PinRegistry {
    pub fn new() -> Self {
        PinRegistry::default()
    }

    /// Claims `pin_number` for exclusive use. `inverted` flips the
    /// logical level before it reaches [`IoPin::logical_to_physical`].
    /// `default_level` is the physical level the pin should be left
    /// at when no driver is actively using it (e.g. a stepper's
    /// disabled/high-impedance state).
    pub fn claim(&self, pin_number: u8, inverted: bool, default_level: bool) -> Result<IoPin, DriverError> {
        let mut inner = self.0.lock().unwrap();
        if !inner.claimed.insert(pin_number) {
            return Err(DriverError::PinAlreadyClaimed(pin_number));
        }
        Ok(IoPin {
            pin_number,
            inverted,
            default_level,
            registry: self.0.clone(),
        })
    }

    /// Pins claimed-and-dropped since the last call, each paired with
    /// the physical level they should be restored to. Called by the
    /// scheduler's exit handler, never during normal operation.
    pub fn drain_restores(&self) -> Vec<(u8, bool)> {
        let mut inner = self.0.lock().unwrap();
        std::mem::take(&mut inner.restore_log)
    }
}

/// A single claimed physical pin. Dropping it releases the pin number
/// back to the registry and queues its default level for restoration.
pub struct IoPin {
    pin_number: u8,
    inverted: bool,
    default_level: bool,
    registry: Arc<Mutex<RegistryInner>>,
}

impl IoPin {
    pub fn pin_number(&self) -> u8 {
        self.pin_number
    }

    /// Applies this pin's inversion to a logical (driver-intent) level,
    /// yielding the physical level that should actually be written.
    pub fn logical_to_physical(&self, logical: bool) -> bool {
        logical ^ self.inverted
    }
}

impl Drop for IoPin {
    fn drop(&mut self) {
        let mut inner = self.registry.lock().unwrap();
        inner.claimed.remove(&self.pin_number);
        inner.restore_log.push((self.pin_number, self.default_level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claiming_the_same_pin_twice_fails() {
        let registry = PinRegistry::new();
        let _a = registry.claim(7, false, false).unwrap();
        assert_eq!(registry.claim(7, false, false), Err(DriverError::PinAlreadyClaimed(7)));
    }

    #[test]
    fn dropping_a_pin_frees_it_and_logs_its_default() {
        let registry = PinRegistry::new();
        {
            let _a = registry.claim(3, false, true).unwrap();
        }
        assert_eq!(registry.drain_restores(), vec![(3, true)]);
        // freed, so re-claiming now succeeds
        assert!(registry.claim(3, false, true).is_ok());
    }

    #[test]
    fn inversion_flips_logical_level() {
        let registry = PinRegistry::new();
        let pin = registry.claim(1, true, false).unwrap();
        assert!(!pin.logical_to_physical(true));
        assert!(pin.logical_to_physical(false));
    }
}
