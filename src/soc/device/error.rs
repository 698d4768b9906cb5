use std::{error::Error, fmt};

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug)]
pub enum DeviceError {
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    Unsupported(&'static str),
    Backend(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutOfRange {
                offset,
                len,
                capacity,
            } => {
                write!(
                    f,
                    "device access offset 0x{offset:08X} len {len} exceeds capacity 0x{capacity:08X}"
                )
            }
            DeviceError::Unsupported(msg) => write!(f, "device operation unsupported: {msg}"),
            DeviceError::Backend(_) => write!(f, "device backend error"),
        }
    }
}

impl Error for DeviceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DeviceError::Backend(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}
