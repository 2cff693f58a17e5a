//! Reading a GPIO input level is a different concern from scheduling
//! an output edge: `hw-scheduler`'s `MemoryMap` only exists to give the
//! DMA engine a destination, so endstop/thermistor sense pins need
//! their own mapping of the BCM2835 GPIO peripheral's level registers
//! (`GPLEV0`/`GPLEV1`), read synchronously rather than scheduled ahead
//! of time.

use std::sync::Mutex;

use hw_scheduler::MemoryMap;
use io_drivers::PinReader;

/// Word offset of `GPLEV0` within the GPIO peripheral's register block
/// (byte offset 0x34, per the BCM2835 ARM peripherals datasheet).
const GPLEV0_WORD_OFFSET: usize = 0x34 / 4;

/// Reads pin levels out of a [`MemoryMap`] mapping the GPIO
/// peripheral's register block, splitting pins 0-31 (`GPLEV0`) from
/// 32-53 (`GPLEV1`) the way the BCM2835 does.
///
/// Wrapped in a `Mutex` even though reads don't logically mutate
/// anything, because `MemoryMap::read_u32` takes `&self` but the
/// concrete backends (`VecMemMap`, `DevMemMap`) aren't `Sync` and
/// `EndstopDriver`/`RcThermistor` need `Arc<dyn PinReader + Send +
/// Sync>`.
pub struct GpioLevelReader<M: MemoryMap> {
    mem: Mutex<M>,
}

impl<M: MemoryMap> GpioLevelReader<M> {
    pub fn new(mem: M) -> Self {
        GpioLevelReader { mem: Mutex::new(mem) }
    }
}

impl<M: MemoryMap + Send> PinReader for GpioLevelReader<M> {
    fn read_digital(&self, pin: u8) -> bool {
        let mem = self.mem.lock().unwrap();
        let word = GPLEV0_WORD_OFFSET + (pin as usize / 32);
        let bit = pin as usize % 32;
        (mem.read_u32(word) >> bit) & 1 != 0
    }
}
