//! Abstracts the one genuinely unsafe thing this crate does: mapping a
//! block of physical memory (DMA-coherent RAM, or the BCM2835
//! peripheral register block) into the process's address space.
//! Everything above this trait is ordinary safe Rust; `unsafe` stays
//! confined to [`DevMemMap`]'s constructor and `Drop`.

use crate::error::SchedulerError;

/// A mapped block of 32-bit registers or memory, addressable both by
/// virtual offset (for `read_u32`/`write_u32`) and by physical address
/// (for telling the DMA engine where to find it).
pub trait MemoryMap {
    fn read_u32(&self, offset: usize) -> u32;
    fn write_u32(&mut self, offset: usize, value: u32);
    /// The physical bus address of `offset` within this mapping, for
    /// handing to a DMA control block's source/dest fields.
    fn physical_address(&self, offset: usize) -> usize;
    fn len_words(&self) -> usize;
}

/// An in-memory backend used by every test in this crate (and by
/// `printipi` when no physical pin assignments exist to give real
/// register addresses meaning). No test in this workspace requires
/// root or a Raspberry Pi.
#[derive(Debug, Clone)]
pub struct VecMemMap {
    words: Vec<u32>,
    base_physical_address: usize,
}

impl VecMemMap {
    pub fn new(len_words: usize, base_physical_address: usize) -> Self {
        VecMemMap { words: vec![0; len_words], base_physical_address }
    }
}

impl MemoryMap for VecMemMap {
    fn read_u32(&self, offset: usize) -> u32 {
        self.words[offset]
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.words[offset] = value;
    }

    fn physical_address(&self, offset: usize) -> usize {
        self.base_physical_address + offset * std::mem::size_of::<u32>()
    }

    fn len_words(&self) -> usize {
        self.words.len()
    }
}

/// A real `/dev/mem` mapping of physical memory, L2-coherent (so the
/// DMA engine, which bypasses the L1 cache, sees writes promptly) by
/// mapping with `MAP_SHARED` and relying on the kernel's uncached
/// `/dev/mem` view of peripheral and DMA-coherent regions.
#[cfg(target_os = "linux")]
pub struct DevMemMap {
    virtual_base: *mut u32,
    physical_base: usize,
    len_words: usize,
}

#[cfg(target_os = "linux")]
impl DevMemMap {
    /// Maps `len_words` 32-bit words starting at `physical_base`.
    /// Requires read/write access to `/dev/mem` (root, in practice).
    pub fn new(physical_base: usize, len_words: usize) -> Result<Self, SchedulerError> {
        use std::fs::OpenOptions;
        use std::os::unix::io::AsRawFd;

        let len_bytes = len_words * std::mem::size_of::<u32>();
        let file = OpenOptions::new().read(true).write(true).open("/dev/mem")?;

        // SAFETY: `/dev/mem` with MAP_SHARED at a peripheral's known
        // physical base is the standard (if inherently unsafe) way to
        // get userspace access to memory-mapped I/O on Linux without a
        // kernel driver. The fd outlives the call (mmap dup's the
        // mapping, not the fd), and we immediately check for MAP_FAILED.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len_bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                physical_base as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(SchedulerError::PeripheralMap(std::io::Error::last_os_error()));
        }

        Ok(DevMemMap { virtual_base: addr as *mut u32, physical_base, len_words })
    }
}

#[cfg(target_os = "linux")]
impl MemoryMap for DevMemMap {
    fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset < self.len_words);
        // SAFETY: `offset` is bounds-checked above and the mapping is
        // valid for `len_words` words for the lifetime of `self`.
        unsafe { std::ptr::read_volatile(self.virtual_base.add(offset)) }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        assert!(offset < self.len_words);
        // SAFETY: see `read_u32`.
        unsafe { std::ptr::write_volatile(self.virtual_base.add(offset), value) }
    }

    fn physical_address(&self, offset: usize) -> usize {
        self.physical_base + offset * std::mem::size_of::<u32>()
    }

    fn len_words(&self) -> usize {
        self.len_words
    }
}

#[cfg(target_os = "linux")]
impl Drop for DevMemMap {
    fn drop(&mut self) {
        let len_bytes = self.len_words * std::mem::size_of::<u32>();
        // SAFETY: `virtual_base` was returned by a successful `mmap`
        // of exactly `len_bytes`, and this is the only unmap of it.
        unsafe {
            libc::munmap(self.virtual_base as *mut libc::c_void, len_bytes);
        }
    }
}

// `DevMemMap` owns a raw pointer into memory the kernel guarantees is
// exclusively this mapping's; there's no aliasing with other Rust data
// for `Send`/`Sync` to protect against.
#[cfg(target_os = "linux")]
unsafe impl Send for DevMemMap {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_mem_map_round_trips_writes() {
        let mut map = VecMemMap::new(16, 0x3f00_0000);
        map.write_u32(4, 0xdead_beef);
        assert_eq!(map.read_u32(4), 0xdead_beef);
        assert_eq!(map.physical_address(4), 0x3f00_0000 + 16);
    }
}
