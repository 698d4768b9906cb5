use std::{error::Error, fmt};

pub type BusResult<T> = Result<T, BusError>;

/// Level of the page walk at which a translation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLevel {
    Directory,
    Table,
}

impl fmt::Display for PageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLevel::Directory => f.write_str("page directory"),
            PageLevel::Table => f.write_str("page table"),
        }
    }
}

#[derive(Debug)]
pub enum BusError {
    NotMapped {
        address: u32,
    },
    Overlap {
        address: u32,
        details: String,
    },
    PageFault {
        address: u32,
        level: PageLevel,
        entry: u32,
    },
    DeviceFault {
        device: String,
        source: Box<dyn Error + Send + Sync>,
    },
    OutOfBounds {
        address: u32,
        len: usize,
        capacity: usize,
    },
    UnsupportedWidth {
        bytes: usize,
    },
    InvalidDeviceSpan {
        device: String,
    },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::NotMapped { address } => write!(f, "address 0x{address:08X} is not mapped"),
            BusError::Overlap { address, details } => write!(
                f,
                "address 0x{address:08X} overlaps existing mapping ({details})"
            ),
            BusError::PageFault {
                address,
                level,
                entry,
            } => write!(
                f,
                "page fault: {level} entry 0x{entry:08X} for address 0x{address:08X} is not present"
            ),
            BusError::DeviceFault { device, .. } => write!(f, "device '{device}' reported a fault"),
            BusError::OutOfBounds {
                address,
                len,
                capacity,
            } => write!(
                f,
                "physical address 0x{address:08X} (+{len}) is out of bound 0x{capacity:08X}"
            ),
            BusError::UnsupportedWidth { bytes } => {
                write!(f, "bus access width of {bytes} bytes is unsupported")
            }
            BusError::InvalidDeviceSpan { device } => {
                write!(f, "device '{device}' reported an invalid span")
            }
        }
    }
}

impl Error for BusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BusError::DeviceFault { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
