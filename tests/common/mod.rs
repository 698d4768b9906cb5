#![allow(dead_code)]

use hex_literal::hex;
use nemumon::soc::bus::{PageEntry, PageFlags};
use nemumon::soc::core::Cr0;
use nemumon::{Monitor, MonitorConfig};

pub const MEMORY_SIZE: usize = 0x1_0000;
pub const PGDIR: u32 = 0x1000;
pub const PGTAB: u32 = 0x2000;

pub const KERNEL_BASE: u32 = 0xC000_0000;
pub const DATA_PAGE: u32 = KERNEL_BASE;
pub const STACK_PAGE: u32 = KERNEL_BASE + 0x1000;
pub const DEVICE_PAGE: u32 = KERNEL_BASE + 0x2000;

pub const DATA_FRAME: u32 = 0x8000;
// Below the data frame, so the two pages are not physically adjacent.
pub const STACK_FRAME: u32 = 0x4000;
pub const DEVICE_FRAME: u32 = 0xA000;

pub const DATA_IMAGE: [u8; 16] = hex!("78563412 efbeadde 01000000 ffffffff");

/// Writes a present, writable mapping for `vaddr` into the shared page table.
pub fn map_page(mon: &mut Monitor, vaddr: u32, frame: u32) {
    let flags = PageFlags::PRESENT | PageFlags::WRITABLE;
    let slot = PGTAB + ((vaddr >> 12) & 0x3FF) * 4;
    mon.memory_mut()
        .write_physical(slot, 4, PageEntry::new(frame, flags).0)
        .expect("page table entry in RAM");
}

pub fn pte(mon: &Monitor, vaddr: u32) -> PageEntry {
    let slot = PGTAB + ((vaddr >> 12) & 0x3FF) * 4;
    PageEntry(mon.memory().read_physical(slot, 4).expect("page table entry in RAM"))
}

/// 64 KiB machine with paging on. Three pages above `KERNEL_BASE` share one
/// page table; only the data and stack pages are mapped.
pub fn paged_monitor() -> Monitor {
    let mut mon = Monitor::new(MonitorConfig::default().memory_size(MEMORY_SIZE));
    let flags = PageFlags::PRESENT | PageFlags::WRITABLE;
    mon.memory_mut()
        .write_physical(PGDIR + (KERNEL_BASE >> 22) * 4, 4, PageEntry::new(PGTAB, flags).0)
        .expect("directory entry in RAM");
    map_page(&mut mon, DATA_PAGE, DATA_FRAME);
    map_page(&mut mon, STACK_PAGE, STACK_FRAME);
    mon.memory_mut()
        .load(DATA_FRAME, &DATA_IMAGE)
        .expect("data image fits");

    let cpu = mon.cpu_mut();
    cpu.cr3 = PGDIR;
    cpu.cr0 = Cr0::PROTECT_ENABLE | Cr0::PAGING;
    mon
}
