#[path = "device.rs"]
mod device_trait;
pub mod error;
pub mod mmio;
pub mod ram;

pub use device_trait::Device;
pub use error::{DeviceError, DeviceResult};
pub use mmio::RegisterBlock;
pub use ram::RamMemory;
