use crate::soc::device::{DeviceError, DeviceResult};

/// Flat guest physical memory. The backing store is allocated zeroed once and
/// never resized, so every physical address below `len()` is always backed.
pub struct RamMemory {
    bytes: Box<[u8]>,
}

impl RamMemory {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0_u8; len].into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read(&self, offset: usize, out: &mut [u8]) -> DeviceResult<()> {
        if out.is_empty() {
            return Ok(());
        }
        let end = self.checked_end(offset, out.len())?;
        out.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    pub fn write(&mut self, offset: usize, data_in: &[u8]) -> DeviceResult<()> {
        if data_in.is_empty() {
            return Ok(());
        }
        let end = self.checked_end(offset, data_in.len())?;
        self.bytes[offset..end].copy_from_slice(data_in);
        Ok(())
    }

    fn checked_end(&self, offset: usize, len: usize) -> DeviceResult<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(end),
            _ => Err(DeviceError::OutOfRange {
                offset,
                len,
                capacity: self.bytes.len(),
            }),
        }
    }
}
