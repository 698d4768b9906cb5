use std::sync::Arc;

use nemumon::monitor::{EvalError, ExprError};
use nemumon::soc::bus::{BusError, PageFlags, PageLevel};
use nemumon::soc::core::{Cr0, Gpr};
use nemumon::soc::device::RegisterBlock;

use crate::common::{self, DATA_FRAME, DATA_PAGE, DEVICE_FRAME, DEVICE_PAGE, STACK_FRAME, STACK_PAGE};

#[test]
fn dereference_walks_the_page_tables() {
    let mut mon = common::paged_monitor();
    assert_eq!(mon.evaluate_text("*0xC0000000").expect("mapped"), 0x1234_5678);
    assert_eq!(mon.evaluate_text("*(0xC0000000 + 4)").expect("mapped"), 0xDEAD_BEEF_u32 as i32);
    assert_eq!(mon.evaluate_text("*0xC000000C + 1").expect("mapped"), 0);
}

#[test]
fn examine_reads_through_the_translator() {
    let mut mon = common::paged_monitor();
    let words = mon.examine(4, "0xC0000000").expect("data page mapped");
    assert_eq!(
        words,
        vec![
            (DATA_PAGE, 0x1234_5678),
            (DATA_PAGE + 4, 0xDEAD_BEEF),
            (DATA_PAGE + 8, 1),
            (DATA_PAGE + 12, 0xFFFF_FFFF),
        ]
    );
}

#[test]
fn walks_mark_entries_accessed_and_writes_mark_them_dirty() {
    let mut mon = common::paged_monitor();
    mon.evaluate_text("*0xC0000010").expect("mapped");
    let data = common::pte(&mon, DATA_PAGE);
    assert!(data.flags().contains(PageFlags::ACCESSED), "read sets accessed");
    assert!(!data.flags().contains(PageFlags::DIRTY), "read leaves dirty clear");

    mon.virtual_write(STACK_PAGE + 0x20, 4, 7).expect("stack mapped");
    let stack = common::pte(&mon, STACK_PAGE);
    assert!(stack.flags().contains(PageFlags::ACCESSED | PageFlags::DIRTY));
    assert_eq!(mon.memory().read_physical(STACK_FRAME + 0x20, 4).unwrap(), 7);
}

#[test]
fn page_faults_are_recoverable() {
    let mut mon = common::paged_monitor();
    let err = mon.evaluate_text("*0x00400000").expect_err("no directory entry");
    assert!(matches!(
        err,
        ExprError::Eval(EvalError::Memory(BusError::PageFault {
            address: 0x0040_0000,
            level: PageLevel::Directory,
            ..
        }))
    ));
    let err = mon.virtual_read(DEVICE_PAGE, 4).expect_err("no table entry");
    assert!(matches!(err, BusError::PageFault { level: PageLevel::Table, .. }));

    assert_eq!(
        mon.evaluate_text("*0xC0000000").expect("session still usable"),
        0x1234_5678
    );
}

#[test]
fn cross_page_access_uses_each_pages_frame() {
    let mut mon = common::paged_monitor();
    mon.memory_mut().load(DATA_FRAME + 0xFFE, &[0xAA, 0xBB]).unwrap();
    mon.memory_mut().load(STACK_FRAME, &[0xCC, 0xDD]).unwrap();
    assert_eq!(mon.virtual_read(DATA_PAGE + 0xFFE, 4).unwrap(), 0xDDCC_BBAA);
    assert_eq!(
        mon.evaluate_text("*0xC0000FFE").unwrap(),
        0xDDCC_BBAA_u32 as i32
    );

    mon.virtual_write(STACK_PAGE - 1, 2, 0x2211).unwrap();
    assert_eq!(mon.memory().read_physical(DATA_FRAME + 0xFFF, 1).unwrap(), 0x11);
    assert_eq!(mon.memory().read_physical(STACK_FRAME, 1).unwrap(), 0x22);
}

#[test]
fn paging_needs_both_control_bits() {
    let mut mon = common::paged_monitor();
    mon.cpu_mut().cr0 = Cr0::PAGING;
    assert_eq!(
        mon.evaluate_text("*0x8000").expect("identity mapped"),
        0x1234_5678,
        "PG without PE leaves translation off"
    );
}

#[test]
fn mmio_window_shadows_ram_behind_a_mapped_page() {
    let mut mon = common::paged_monitor();
    let uart = Arc::new(RegisterBlock::new("uart", 0x10));
    mon.memory_mut()
        .map_mmio_shared(DEVICE_FRAME, uart.clone())
        .expect("window fits");
    common::map_page(&mut mon, DEVICE_PAGE, DEVICE_FRAME);

    mon.virtual_write(DEVICE_PAGE + 4, 4, 0xAABB_CCDD).expect("device write");
    assert_eq!(&uart.snapshot()[4..8], &[0xDD, 0xCC, 0xBB, 0xAA]);

    let mut shadowed = [0u8; 4];
    mon.memory().ram().read(DEVICE_FRAME as usize + 4, &mut shadowed).unwrap();
    assert_eq!(shadowed, [0; 4], "RAM under the window is untouched");

    assert_eq!(mon.evaluate_text("*0xC0002004").unwrap(), 0xAABB_CCDD_u32 as i32);
    assert_eq!(
        mon.virtual_read(DEVICE_PAGE + 0x10, 4).expect("ram past the window"),
        0,
        "bytes past the window fall through to RAM"
    );
}

#[test]
fn interrupt_frame_lands_on_the_paged_stack() {
    let mut mon = common::paged_monitor();
    {
        let cpu = mon.cpu_mut();
        cpu.idtr.base = DATA_PAGE + 0x100;
        cpu.idtr.limit = 0xFF;
        cpu.set_gpr(Gpr::Esp, STACK_PAGE + 0x1000);
    }
    let gate = DATA_PAGE + 0x100 + 3 * 8;
    mon.virtual_write(gate, 2, 0x5678).unwrap();
    mon.virtual_write(gate + 6, 2, 0xC000).unwrap();

    let target = mon.raise_interrupt(3, 0xC000_0042).expect("gate in range");
    assert_eq!(target, 0xC000_5678);
    assert_eq!(mon.evaluate_text("$eip").unwrap(), 0xC000_5678_u32 as i32);

    let mem = mon.memory();
    assert_eq!(mem.read_physical(STACK_FRAME + 0xFFC, 4).unwrap(), 0x2, "eflags");
    assert_eq!(mem.read_physical(STACK_FRAME + 0xFF8, 4).unwrap(), 0x8, "cs");
    assert_eq!(mem.read_physical(STACK_FRAME + 0xFF4, 4).unwrap(), 0xC000_0042, "return");
    assert_eq!(mon.cpu().gpr(Gpr::Esp), STACK_PAGE + 0x1000 - 12);
}
