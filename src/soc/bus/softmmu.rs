//! Software MMU for the two-level x86 paging scheme, layered on top of the
//! physical `MemorySystem`. A translator is a short-lived view that borrows the
//! memory system mutably, because walking the tables sets accessed and dirty
//! bits in guest memory exactly like the hardware walker does.
use bitflags::bitflags;

use crate::soc::bus::{BusError, BusResult, MemorySystem, PageLevel};

pub type VirtAddr = u32;
pub type PhysAddr = u32;

pub const PAGE_SIZE: u32 = 0x1000;
const FRAME_MASK: u32 = !(PAGE_SIZE - 1);
const ENTRY_BYTES: u32 = 4;

bitflags! {
    /// Low bits shared by page directory and page table entries.
    #[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
    pub struct PageFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6; // PTE only
    }
}

/// Raw 32-bit page directory or page table entry as stored in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry(pub u32);

impl PageEntry {
    pub fn new(frame_base: PhysAddr, flags: PageFlags) -> Self {
        Self((frame_base & FRAME_MASK) | flags.bits())
    }

    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }

    pub fn is_present(self) -> bool {
        self.flags().contains(PageFlags::PRESENT)
    }

    pub fn frame_base(self) -> PhysAddr {
        self.0 & FRAME_MASK
    }

    fn with(self, flags: PageFlags) -> Self {
        Self(self.0 | flags.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessIntent {
    Read,
    Write,
}

/// Paging configuration sampled from the CPU control registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PagingMode {
    pub enabled: bool,
    pub directory_base: PhysAddr,
}

impl PagingMode {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            directory_base: 0,
        }
    }

    pub const fn enabled(directory_base: PhysAddr) -> Self {
        Self {
            enabled: true,
            directory_base: directory_base & FRAME_MASK,
        }
    }
}

/// Anything that can report the current paging configuration (the CPU state).
pub trait PagingControl {
    fn paging_mode(&self) -> PagingMode;
}

#[inline(always)]
pub fn directory_index(vaddr: VirtAddr) -> u32 {
    (vaddr >> 22) & 0x3FF
}

#[inline(always)]
pub fn table_index(vaddr: VirtAddr) -> u32 {
    (vaddr >> 12) & 0x3FF
}

#[inline(always)]
pub fn page_offset(vaddr: VirtAddr) -> u32 {
    vaddr & !FRAME_MASK
}

pub struct SoftMMU<'m> {
    memory: &'m mut MemorySystem,
    mode: PagingMode,
}

impl<'m> SoftMMU<'m> {
    pub fn new(memory: &'m mut MemorySystem, mode: PagingMode) -> Self {
        Self { memory, mode }
    }

    pub fn translate(&mut self, vaddr: VirtAddr, intent: AccessIntent) -> BusResult<PhysAddr> {
        if !self.mode.enabled {
            return Ok(vaddr);
        }

        let pde_addr = self.mode.directory_base + directory_index(vaddr) * ENTRY_BYTES;
        let pde = self.load_entry(pde_addr, vaddr, PageLevel::Directory)?;
        self.store_entry(pde_addr, pde, pde.with(PageFlags::ACCESSED))?;

        let pte_addr = pde.frame_base() + table_index(vaddr) * ENTRY_BYTES;
        let pte = self.load_entry(pte_addr, vaddr, PageLevel::Table)?;
        let mut marks = PageFlags::ACCESSED;
        if intent == AccessIntent::Write {
            marks |= PageFlags::DIRTY;
        }
        self.store_entry(pte_addr, pte, pte.with(marks))?;

        let paddr = pte.frame_base() | page_offset(vaddr);
        log::trace!(
            "translate 0x{vaddr:08X} ({intent:?}) via pde 0x{:08X} pte 0x{:08X} -> 0x{paddr:08X}",
            pde.0,
            pte.0
        );
        Ok(paddr)
    }

    /// Reads `width` bytes at a virtual address. Spans that cross a page
    /// boundary are transferred one byte at a time with each byte translated
    /// on its own, since neighbouring pages need not be physically adjacent.
    pub fn virtual_read(&mut self, vaddr: VirtAddr, width: usize) -> BusResult<u32> {
        check_width(width)?;
        if crosses_page(vaddr, width) {
            let mut data = 0u32;
            for i in 0..width {
                let byte_addr = vaddr.wrapping_add(i as u32);
                let paddr = self.translate(byte_addr, AccessIntent::Read)?;
                data |= self.memory.read_physical(paddr, 1)? << (8 * i);
            }
            return Ok(data);
        }
        let paddr = self.translate(vaddr, AccessIntent::Read)?;
        self.memory.read_physical(paddr, width)
    }

    pub fn virtual_write(&mut self, vaddr: VirtAddr, width: usize, value: u32) -> BusResult<()> {
        check_width(width)?;
        if crosses_page(vaddr, width) {
            for i in 0..width {
                let byte_addr = vaddr.wrapping_add(i as u32);
                let paddr = self.translate(byte_addr, AccessIntent::Write)?;
                self.memory.write_physical(paddr, 1, value >> (8 * i))?;
            }
            return Ok(());
        }
        let paddr = self.translate(vaddr, AccessIntent::Write)?;
        self.memory.write_physical(paddr, width, value)
    }

    fn load_entry(&self, entry_addr: PhysAddr, vaddr: VirtAddr, level: PageLevel) -> BusResult<PageEntry> {
        let entry = PageEntry(self.memory.read_physical(entry_addr, 4)?);
        if !entry.is_present() {
            return Err(BusError::PageFault {
                address: vaddr,
                level,
                entry: entry.0,
            });
        }
        Ok(entry)
    }

    fn store_entry(&mut self, entry_addr: PhysAddr, old: PageEntry, new: PageEntry) -> BusResult<()> {
        if old == new {
            return Ok(());
        }
        self.memory.write_physical(entry_addr, 4, new.0)
    }
}

fn crosses_page(vaddr: VirtAddr, width: usize) -> bool {
    let last = vaddr.wrapping_add(width as u32 - 1);
    (vaddr & FRAME_MASK) != (last & FRAME_MASK)
}

fn check_width(width: usize) -> BusResult<()> {
    match width {
        1 | 2 | 4 => Ok(()),
        bytes => Err(BusError::UnsupportedWidth { bytes }),
    }
}
