pub mod error;
pub mod range;
pub mod softbus;
pub mod softmmu;

pub use error::{BusError, BusResult, PageLevel};
pub use range::{DeviceRef, MmioRegion};
pub use softbus::{DEFAULT_PMEM_SIZE, MemorySystem};
pub use softmmu::{AccessIntent, PageEntry, PageFlags, PagingControl, PagingMode, SoftMMU};
