use bitflags::bitflags;

use crate::soc::bus::{BusError, PagingControl, PagingMode};
use crate::soc::core::register::{Gpr, Register, RegisterTable};

bitflags! {
    #[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
    pub struct Cr0: u32 {
        const PROTECT_ENABLE = 1 << 0;
        const PAGING         = 1 << 31;
    }
}

/// Base and limit of a descriptor table register such as IDTR.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTable {
    pub base: u32,
    pub limit: u16,
}

/// Architectural register state of the emulated CPU. The monitor only reads
/// it; setters exist for the execution driver and for seeding tests.
#[derive(Debug, Clone)]
pub struct CpuState {
    gpr: [u32; 8],
    pub eip: u32,
    pub eflags: u32,
    pub cs: u16,
    pub cr0: Cr0,
    pub cr3: u32,
    pub idtr: DescriptorTable,
    names: RegisterTable,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    pub fn new() -> Self {
        Self {
            gpr: [0; 8],
            eip: 0,
            // Bit 1 of EFLAGS is reserved and reads as one.
            eflags: 0x2,
            cs: 0x8,
            cr0: Cr0::empty(),
            cr3: 0,
            idtr: DescriptorTable::default(),
            names: RegisterTable::new(),
        }
    }

    pub fn gpr(&self, gpr: Gpr) -> u32 {
        self.gpr[gpr.index()]
    }

    pub fn set_gpr(&mut self, gpr: Gpr, value: u32) {
        self.gpr[gpr.index()] = value;
    }

    pub fn read(&self, reg: Register) -> u32 {
        let full = match reg.gpr() {
            Some(gpr) => self.gpr(gpr),
            None => self.eip,
        };
        let (shift, width) = reg.slice();
        (full >> shift) & width_mask(width)
    }

    pub fn write(&mut self, reg: Register, value: u32) {
        let (shift, width) = reg.slice();
        let mask = width_mask(width) << shift;
        let slot = match reg.gpr() {
            Some(gpr) => &mut self.gpr[gpr.index()],
            None => &mut self.eip,
        };
        *slot = (*slot & !mask) | ((value << shift) & mask);
    }

    pub fn read_register(&self, name: &str) -> StateResult<u32> {
        let reg = self.resolve(name)?;
        Ok(self.read(reg))
    }

    pub fn write_register(&mut self, name: &str, value: u32) -> StateResult<()> {
        let reg = self.resolve(name)?;
        self.write(reg, value);
        Ok(())
    }

    pub fn current_instruction_pointer(&self) -> u32 {
        self.eip
    }

    /// Snapshot of every named register in display order.
    pub fn snapshot(&self) -> Vec<(&'static str, u32)> {
        self.names
            .iter()
            .map(|(name, reg)| (name, self.read(reg)))
            .collect()
    }

    fn resolve(&self, name: &str) -> StateResult<Register> {
        self.names
            .lookup(name)
            .ok_or_else(|| StateError::UnknownRegister(name.to_string()))
    }
}

impl PagingControl for CpuState {
    fn paging_mode(&self) -> PagingMode {
        if self.cr0.contains(Cr0::PROTECT_ENABLE | Cr0::PAGING) {
            PagingMode::enabled(self.cr3)
        } else {
            PagingMode::disabled()
        }
    }
}

fn width_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[derive(Debug)]
pub enum StateError {
    Bus(BusError),
    UnknownRegister(String),
    GateOutOfRange { vector: u8, limit: u16 },
}

pub type StateResult<T> = Result<T, StateError>;

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Bus(err) => write!(f, "bus error: {err}"),
            StateError::UnknownRegister(name) => write!(f, "unknown register '{name}'"),
            StateError::GateOutOfRange { vector, limit } => {
                write!(f, "interrupt gate {vector} lies beyond IDT limit 0x{limit:04X}")
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Bus(err) => Some(err),
            StateError::UnknownRegister(_) => None,
            StateError::GateOutOfRange { .. } => None,
        }
    }
}

impl From<BusError> for StateError {
    fn from(err: BusError) -> Self {
        StateError::Bus(err)
    }
}
