//! Memory-mapped DMA/PWM/GPIO scheduling: the layer that turns
//! `io-drivers`' [`io_drivers::OutputEvent`]s into actual pin
//! transitions on a fixed playback schedule, modeled on the BCM2835
//! peripheral set the Raspberry Pi uses for exactly this purpose.

pub mod constants;
pub mod error;
pub mod memory_map;
pub mod ring;
pub mod scheduler;

pub use error::SchedulerError;
pub use memory_map::MemoryMap;
#[cfg(target_os = "linux")]
pub use memory_map::DevMemMap;
pub use memory_map::VecMemMap;
pub use ring::{DmaControlBlock, GpioBufferFrame, PwmHeader};
pub use scheduler::HardwareScheduler;
