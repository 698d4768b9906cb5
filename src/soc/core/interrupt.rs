//! Protected-mode interrupt entry through the IDT. Pushes the return frame
//! on the guest stack and redirects `eip` to the gate's handler offset.

use crate::soc::bus::{MemorySystem, PagingControl, SoftMMU};
use crate::soc::core::register::Gpr;
use crate::soc::core::state::{CpuState, StateError, StateResult};

const GATE_DESC_BYTES: u32 = 8;

/// Raises interrupt `vector` with `return_addr` as the resume address and
/// returns the handler address now loaded into `eip`.
pub fn raise_interrupt(
    cpu: &mut CpuState,
    memory: &mut MemorySystem,
    vector: u8,
    return_addr: u32,
) -> StateResult<u32> {
    let gate_addr = cpu
        .idtr
        .base
        .wrapping_add(vector as u32 * GATE_DESC_BYTES);
    let gate_end = gate_addr.wrapping_add(GATE_DESC_BYTES - 1);
    if gate_end > cpu.idtr.base.wrapping_add(cpu.idtr.limit as u32) {
        return Err(StateError::GateOutOfRange {
            vector,
            limit: cpu.idtr.limit,
        });
    }

    // Gate first: a faulting IDT read must leave the stack untouched.
    let mut mmu = SoftMMU::new(memory, cpu.paging_mode());
    let offset_low = mmu.virtual_read(gate_addr, 2)?;
    let offset_high = mmu.virtual_read(gate_addr.wrapping_add(GATE_DESC_BYTES - 2), 2)?;
    let target = (offset_high << 16) | offset_low;

    let mut esp = cpu.gpr(Gpr::Esp);
    for value in [cpu.eflags, cpu.cs as u32, return_addr] {
        esp = esp.wrapping_sub(4);
        mmu.virtual_write(esp, 4, value)?;
    }

    cpu.set_gpr(Gpr::Esp, esp);
    cpu.eip = target;
    log::debug!("interrupt {vector}: return 0x{return_addr:08X}, handler 0x{target:08X}");
    Ok(target)
}
