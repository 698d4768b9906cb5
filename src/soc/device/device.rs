//! Defines the `Device` trait implemented by memory-mapped I/O backends. The
//! memory system dispatches physical accesses that land inside a registered
//! MMIO range to the device with an offset relative to the range base, and
//! wraps any `DeviceError` as `BusError::DeviceFault`.
use std::ops::Range;

use super::error::DeviceResult;

pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Device-local byte span. The bus maps `span().len()` bytes starting at
    /// the registration base.
    fn span(&self) -> Range<usize>;

    /// Read a contiguous slice of bytes from the device at `byte_offset` into `out`.
    fn read(&self, byte_offset: usize, out: &mut [u8]) -> DeviceResult<()>;

    /// Write a contiguous slice of bytes to the device at `byte_offset` from `data`.
    fn write(&self, byte_offset: usize, data: &[u8]) -> DeviceResult<()>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::soc::bus::{BusError, MemorySystem};
    use crate::soc::device::DeviceError;

    /// Records the device-local offset of every access; offset 3 is broken.
    #[derive(Default)]
    struct Probe {
        offsets: Mutex<Vec<usize>>,
    }

    impl Device for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn span(&self) -> Range<usize> {
            0..8
        }

        fn read(&self, byte_offset: usize, out: &mut [u8]) -> DeviceResult<()> {
            self.offsets.lock().unwrap().push(byte_offset);
            if byte_offset == 3 {
                let io = std::io::Error::other("stuck bit");
                return Err(DeviceError::Backend(Box::new(io)));
            }
            out.fill(byte_offset as u8);
            Ok(())
        }

        fn write(&self, byte_offset: usize, _data: &[u8]) -> DeviceResult<()> {
            self.offsets.lock().unwrap().push(byte_offset);
            Ok(())
        }
    }

    #[test]
    fn accesses_arrive_relative_to_the_window_base() {
        let probe = std::sync::Arc::new(Probe::default());
        let mut mem = MemorySystem::new(0x100);
        mem.map_mmio_shared(0x4000_0000, probe.clone()).expect("map probe");

        assert_eq!(mem.read_physical(0x4000_0002, 1).unwrap(), 2);
        mem.write_physical(0x4000_0004, 4, 0).unwrap();
        assert_eq!(*probe.offsets.lock().unwrap(), vec![2, 4]);
    }

    #[test]
    fn backend_failures_surface_as_device_faults() {
        let mut mem = MemorySystem::new(0x100);
        mem.map_mmio(0x4000_0000, Probe::default()).expect("map probe");
        let err = mem.read_physical(0x4000_0003, 1).expect_err("broken offset");
        assert!(
            matches!(&err, BusError::DeviceFault { device, .. } if device == "probe"),
            "unexpected error {err}"
        );
        assert!(std::error::Error::source(&err).is_some(), "backend error kept as source");
    }
}
