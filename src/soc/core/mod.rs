//! CPU-side collaborators of the monitor: the register file with its name
//! aliases, control registers that drive paging, and interrupt entry.

pub mod interrupt;
pub mod register;
pub mod state;

pub use interrupt::raise_interrupt;
pub use register::{Gpr, Register, RegisterTable};
pub use state::{Cr0, CpuState, DescriptorTable, StateError, StateResult};
