//! `MemorySystem` owns the guest physical address space: one flat RAM array
//! starting at physical address zero plus any number of MMIO windows layered
//! over it. MMIO windows win over RAM, so a device can shadow part of memory.
//! All accesses are 1, 2 or 4 bytes wide and little endian.
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::soc::device::{Device, RamMemory};

use super::{
    error::{BusError, BusResult},
    range::{DeviceRef, MmioRegion},
};

/// Size of guest physical memory unless configured otherwise (128 MiB).
pub const DEFAULT_PMEM_SIZE: usize = 128 * 1024 * 1024;

const ADDRESS_SPACE_END: u64 = 1 << 32;

pub struct MemorySystem {
    ram: RamMemory,
    // Key: bus start address of each MMIO window.
    regions: BTreeMap<u64, MmioRegion>,
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new(DEFAULT_PMEM_SIZE)
    }
}

impl MemorySystem {
    pub fn new(pmem_size: usize) -> Self {
        Self {
            ram: RamMemory::new(pmem_size),
            regions: BTreeMap::new(),
        }
    }

    pub fn ram(&self) -> &RamMemory {
        &self.ram
    }

    pub fn map_mmio(&mut self, base: u32, device: impl Device + 'static) -> BusResult<()> {
        self.map_mmio_shared(base, Arc::new(device))
    }

    /// Registers `device` at physical address `base`. The caller keeps its
    /// own handle on the device so it can inspect device state afterwards.
    pub fn map_mmio_shared(&mut self, base: u32, device: DeviceRef) -> BusResult<()> {
        let span = device.span();
        if span.is_empty() {
            return Err(BusError::InvalidDeviceSpan {
                device: device.name().to_string(),
            });
        }
        let bus_start = base as u64;
        let bus_end = bus_start + span.len() as u64;
        if bus_end > ADDRESS_SPACE_END {
            return Err(BusError::OutOfBounds {
                address: base,
                len: span.len(),
                capacity: ADDRESS_SPACE_END as usize,
            });
        }
        if let Some(existing) = self.first_overlap(bus_start, bus_end) {
            return Err(BusError::Overlap {
                address: base,
                details: format!("MMIO window of '{}'", existing.device.name()),
            });
        }

        log::debug!(
            "mapped MMIO device '{}' at 0x{bus_start:08X}..0x{bus_end:08X}",
            device.name()
        );
        self.regions.insert(
            bus_start,
            MmioRegion {
                bus_start,
                bus_end,
                device_offset: span.start,
                device,
            },
        );
        Ok(())
    }

    pub fn unmap_mmio(&mut self, address: u32) -> BusResult<()> {
        let key = self
            .mmio_region_for(address)
            .map(|region| region.bus_start)
            .ok_or(BusError::NotMapped { address })?;
        self.regions.remove(&key);
        Ok(())
    }

    /// MMIO probe: the window containing `addr`, if any.
    pub fn mmio_region_for(&self, addr: u32) -> Option<&MmioRegion> {
        let addr = addr as u64;
        self.regions
            .range(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.contains(addr))
    }

    pub fn read_physical(&self, addr: u32, width: usize) -> BusResult<u32> {
        check_width(width)?;
        let mut buf = [0u8; 4];
        if let Some(region) = self.mmio_region_for(addr) {
            let offset = region.device_offset_for(addr as u64);
            region
                .device
                .read(offset, &mut buf[..width])
                .map_err(|err| device_fault(region, err))?;
        } else {
            self.check_no_window_inside(addr, width)?;
            self.read_ram(addr, &mut buf[..width])?;
        }
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_physical(&mut self, addr: u32, width: usize, value: u32) -> BusResult<()> {
        check_width(width)?;
        let bytes = value.to_le_bytes();
        if let Some(region) = self.mmio_region_for(addr) {
            let offset = region.device_offset_for(addr as u64);
            return region
                .device
                .write(offset, &bytes[..width])
                .map_err(|err| device_fault(region, err));
        }
        self.check_no_window_inside(addr, width)?;
        self.write_ram(addr, &bytes[..width])
    }

    /// Copies an image into RAM, bypassing MMIO dispatch.
    pub fn load(&mut self, addr: u32, image: &[u8]) -> BusResult<()> {
        self.write_ram(addr, image)
    }

    fn read_ram(&self, addr: u32, out: &mut [u8]) -> BusResult<()> {
        self.ram
            .read(addr as usize, out)
            .map_err(|_| self.out_of_bounds(addr, out.len()))
    }

    fn write_ram(&mut self, addr: u32, data: &[u8]) -> BusResult<()> {
        let capacity = self.ram.len();
        self.ram
            .write(addr as usize, data)
            .map_err(|_| BusError::OutOfBounds {
                address: addr,
                len: data.len(),
                capacity,
            })
    }

    fn out_of_bounds(&self, addr: u32, len: usize) -> BusError {
        BusError::OutOfBounds {
            address: addr,
            len,
            capacity: self.ram.len(),
        }
    }

    // An access that starts in RAM but runs into an MMIO window is refused
    // rather than split between RAM and the device.
    fn check_no_window_inside(&self, addr: u32, width: usize) -> BusResult<()> {
        let start = addr as u64;
        match self.first_overlap(start, start + width as u64) {
            Some(region) => Err(BusError::Overlap {
                address: addr,
                details: format!("access runs into MMIO window of '{}'", region.device.name()),
            }),
            None => Ok(()),
        }
    }

    fn first_overlap(&self, start: u64, end: u64) -> Option<&MmioRegion> {
        if let Some((_, region)) = self.regions.range(..=start).next_back() {
            if region.overlaps(start, end) {
                return Some(region);
            }
        }
        self.regions.range(start..end).next().map(|(_, region)| region)
    }
}

fn check_width(width: usize) -> BusResult<()> {
    match width {
        1 | 2 | 4 => Ok(()),
        bytes => Err(BusError::UnsupportedWidth { bytes }),
    }
}

fn device_fault(region: &MmioRegion, err: crate::soc::device::DeviceError) -> BusError {
    BusError::DeviceFault {
        device: region.device.name().to_string(),
        source: Box::new(err),
    }
}
