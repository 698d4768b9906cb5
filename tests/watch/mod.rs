use nemumon::monitor::{ExecutionDriver, RunOutcome, StepOutcome, WatchpointHit, WatchpointId, WpError};
use nemumon::soc::bus::{MemorySystem, PagingControl, SoftMMU};
use nemumon::soc::core::{CpuState, Gpr};

use crate::common::{self, DATA_PAGE};

/// Bumps `al` and mirrors a step counter into the guest data page.
struct Ticker {
    ticks: u32,
    halt_after: u32,
}

impl ExecutionDriver for Ticker {
    fn step(&mut self, cpu: &mut CpuState, memory: &mut MemorySystem) -> StepOutcome {
        self.ticks += 1;
        let eax = cpu.gpr(Gpr::Eax);
        cpu.set_gpr(Gpr::Eax, (eax & !0xFF) | ((eax + 1) & 0xFF));
        cpu.eip = cpu.eip.wrapping_add(2);
        SoftMMU::new(memory, cpu.paging_mode())
            .virtual_write(DATA_PAGE + 8, 4, self.ticks)
            .expect("data page mapped");
        if self.ticks >= self.halt_after {
            StepOutcome::Halted
        } else {
            StepOutcome::Continue
        }
    }
}

fn ticker() -> Ticker {
    Ticker { ticks: 0, halt_after: 1_000 }
}

#[test]
fn memory_watchpoint_halts_on_the_changing_step() {
    let mut mon = common::paged_monitor();
    let mut driver = ticker();
    let id = mon.watch("*0xC0000008 > 3").expect("watch");
    assert_eq!(mon.watchpoints()[0].last_value, 0, "seeded from current memory");

    let outcome = mon.run(&mut driver, Some(100));
    assert_eq!(
        outcome,
        RunOutcome::Watchpoint {
            steps: 4,
            hit: WatchpointHit { id, previous: 0, current: 1 },
        }
    );
    assert_eq!(mon.watchpoints()[0].last_value, 1);
    assert_eq!(mon.run(&mut driver, Some(10)), RunOutcome::Completed { steps: 10 });
}

#[test]
fn register_alias_watchpoints_track_their_own_byte() {
    let mut mon = common::paged_monitor();
    mon.cpu_mut().set_gpr(Gpr::Eax, 0x1234_56FE);
    let mut driver = ticker();
    mon.watch("$ah").expect("watch high byte");
    assert_eq!(mon.run(&mut driver, Some(1)), RunOutcome::Completed { steps: 1 });

    let id = mon.watch("$al == 0").expect("watch low byte");
    let outcome = mon.run(&mut driver, None);
    assert_eq!(
        outcome,
        RunOutcome::Watchpoint {
            steps: 1,
            hit: WatchpointHit { id, previous: 0, current: 1 },
        },
        "al wraps from 0xFF to 0x00 while ah stays put"
    );
    assert_eq!(mon.evaluate_text("$eax").unwrap(), 0x1234_5600);
}

#[test]
fn halt_is_reported_when_no_watchpoint_moves() {
    let mut mon = common::paged_monitor();
    let mut driver = Ticker { ticks: 0, halt_after: 3 };
    mon.watch("$esp").expect("watch");
    assert_eq!(mon.run(&mut driver, None), RunOutcome::Halted { steps: 3 });
    assert_eq!(mon.run(&mut driver, None), RunOutcome::Halted { steps: 0 });
}

#[test]
fn pool_capacity_and_slot_reuse_through_the_session() {
    let mut mon = common::paged_monitor();
    for n in 0..32 {
        let id = mon.watch(&format!("$eax + {n}")).expect("capacity 32");
        assert_eq!(id, WatchpointId(n));
    }
    assert!(matches!(
        mon.watch("1"),
        Err(WpError::PoolExhausted { capacity: 32 })
    ));

    mon.delete_watchpoint(WatchpointId(5)).expect("interior delete");
    assert!(matches!(
        mon.delete_watchpoint(WatchpointId(5)),
        Err(WpError::NotFound(5))
    ));
    assert_eq!(mon.watch("$ebx").expect("slot 5 is free"), WatchpointId(5));

    let listed = mon.watchpoints();
    assert_eq!(listed.len(), 32);
    assert_eq!(listed[0].expression, "$ebx");
    assert_eq!(listed[31].id, WatchpointId(0), "oldest watchpoint at the tail");
}

#[test]
fn unresolved_watchpoint_fires_once_its_page_is_mapped() {
    let mut mon = common::paged_monitor();
    let mut driver = ticker();
    let id = mon.watch("*0xC0002000").expect("allocated even though unmapped");
    assert!(!mon.watchpoints()[0].resolved);
    assert_eq!(mon.run(&mut driver, Some(3)), RunOutcome::Completed { steps: 3 });

    common::map_page(&mut mon, common::DEVICE_PAGE, common::DATA_FRAME);
    let outcome = mon.run(&mut driver, Some(3));
    assert_eq!(
        outcome,
        RunOutcome::Watchpoint {
            steps: 1,
            hit: WatchpointHit { id, previous: 0, current: 0x1234_5678 },
        }
    );
    assert!(mon.watchpoints()[0].resolved);
}

#[test]
fn syntax_errors_are_rejected_up_front() {
    let mut mon = common::paged_monitor();
    assert!(matches!(mon.watch("$eax ? 1"), Err(WpError::Syntax(_))));
    assert!(mon.watchpoints().is_empty());
}
