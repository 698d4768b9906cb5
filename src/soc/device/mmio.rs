use std::{ops::Range, sync::Mutex};

use crate::soc::device::{Device, DeviceError, DeviceResult};

/// Plain register window backed by bytes, the simplest MMIO device: reads
/// return whatever was last written. Useful for scratch/status registers and
/// as a stand-in for real device models.
pub struct RegisterBlock {
    name: String,
    len: usize,
    regs: Mutex<Vec<u8>>,
}

impl RegisterBlock {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
            regs: Mutex::new(vec![0_u8; len]),
        }
    }

    /// Copy of the current register contents.
    pub fn snapshot(&self) -> Vec<u8> {
        match self.regs.lock() {
            Ok(regs) => regs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn check(offset: usize, len: usize, capacity: usize) -> DeviceResult<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(offset..end),
            _ => Err(DeviceError::OutOfRange {
                offset,
                len,
                capacity,
            }),
        }
    }
}

impl Device for RegisterBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn span(&self) -> Range<usize> {
        0..self.len
    }

    fn read(&self, byte_offset: usize, out: &mut [u8]) -> DeviceResult<()> {
        let regs = self
            .regs
            .lock()
            .map_err(|_| DeviceError::Unsupported("register block lock poisoned"))?;
        let range = Self::check(byte_offset, out.len(), regs.len())?;
        out.copy_from_slice(&regs[range]);
        Ok(())
    }

    fn write(&self, byte_offset: usize, data: &[u8]) -> DeviceResult<()> {
        let mut regs = self
            .regs
            .lock()
            .map_err(|_| DeviceError::Unsupported("register block lock poisoned"))?;
        let range = Self::check(byte_offset, data.len(), regs.len())?;
        regs[range].copy_from_slice(data);
        Ok(())
    }
}
