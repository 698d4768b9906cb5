use crate::soc::device::Device;

use std::sync::Arc;

pub type DeviceRef = Arc<dyn Device>;

/// One registered MMIO window: `[bus_start, bus_end)` in physical address
/// space, forwarded to `device` at `device_offset + (addr - bus_start)`.
#[derive(Clone)]
pub struct MmioRegion {
    pub bus_start: u64,
    pub bus_end: u64,
    pub device_offset: usize,
    pub device: DeviceRef,
}

impl MmioRegion {
    pub fn contains(&self, addr: u64) -> bool {
        self.bus_start <= addr && addr < self.bus_end
    }

    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.bus_start < end && start < self.bus_end
    }

    /// Device-local offset for a physical address inside this region.
    pub fn device_offset_for(&self, addr: u64) -> usize {
        self.device_offset + (addr - self.bus_start) as usize
    }
}
