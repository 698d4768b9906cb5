pub mod bus;
pub mod core;
pub mod device;
