//! Debugging monitor for a 32-bit x86-style machine emulator: an expression
//! language over registers and guest memory, a fixed pool of watchpoints that
//! are re-checked after every step, and the paged address translation both
//! read through.

pub mod monitor;
pub mod soc;

pub use monitor::{Monitor, MonitorConfig};
