//! Register naming for the 32-bit x86 register file. Every 16- and 8-bit
//! alias resolves to a slice of one of the eight general registers, so a
//! read through any alias agrees with the containing 32-bit register.

use ahash::AHashMap;

/// General registers in instruction-encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gpr {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Gpr {
    pub const ALL: [Gpr; 8] = [
        Gpr::Eax,
        Gpr::Ecx,
        Gpr::Edx,
        Gpr::Ebx,
        Gpr::Esp,
        Gpr::Ebp,
        Gpr::Esi,
        Gpr::Edi,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Dword(Gpr),
    Word(Gpr),
    ByteLow(Gpr),
    ByteHigh(Gpr),
    Eip,
}

impl Register {
    /// Bits `(shift, width)` of the containing register this alias covers.
    pub fn slice(self) -> (u32, u32) {
        match self {
            Register::Dword(_) | Register::Eip => (0, 32),
            Register::Word(_) => (0, 16),
            Register::ByteLow(_) => (0, 8),
            Register::ByteHigh(_) => (8, 8),
        }
    }

    pub fn gpr(self) -> Option<Gpr> {
        match self {
            Register::Dword(gpr)
            | Register::Word(gpr)
            | Register::ByteLow(gpr)
            | Register::ByteHigh(gpr) => Some(gpr),
            Register::Eip => None,
        }
    }
}

pub const DWORD_NAMES: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];
pub const WORD_NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
// x86 byte-register encoding: 0..4 are the low bytes of eax..ebx, 4..8 the high bytes.
pub const BYTE_NAMES: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];

/// Name to register lookup, built once per CPU state.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    by_name: AHashMap<&'static str, Register>,
    order: Vec<(&'static str, Register)>,
}

impl Default for RegisterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterTable {
    pub fn new() -> Self {
        let mut order = Vec::with_capacity(25);
        for (name, gpr) in DWORD_NAMES.iter().zip(Gpr::ALL) {
            order.push((*name, Register::Dword(gpr)));
        }
        for (name, gpr) in WORD_NAMES.iter().zip(Gpr::ALL) {
            order.push((*name, Register::Word(gpr)));
        }
        for (idx, name) in BYTE_NAMES.iter().enumerate() {
            let gpr = Gpr::ALL[idx % 4];
            let reg = if idx < 4 {
                Register::ByteLow(gpr)
            } else {
                Register::ByteHigh(gpr)
            };
            order.push((*name, reg));
        }
        order.push(("eip", Register::Eip));

        let by_name = order.iter().copied().collect();
        Self { by_name, order }
    }

    /// Resolves a register name, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Option<Register> {
        if let Some(reg) = self.by_name.get(name) {
            return Some(*reg);
        }
        let lowered = name.to_ascii_lowercase();
        self.by_name.get(lowered.as_str()).copied()
    }

    /// All registers in display order: 32-bit, 16-bit, 8-bit, then `eip`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Register)> + '_ {
        self.order.iter().copied()
    }
}
