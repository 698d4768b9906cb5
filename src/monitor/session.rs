//! A monitor session: owns the machine state the commands inspect and steps
//! an external execution driver with watchpoint checks in between.

use crate::soc::bus::{BusResult, MemorySystem, PagingControl, SoftMMU};
use crate::soc::core::{CpuState, StateResult, raise_interrupt};

use super::config::MonitorConfig;
use super::error::{EvalError, ExprResult, WpError};
use super::expr::{MachineView, evaluate_text};
use super::watchpoint::{WatchpointHit, WatchpointId, WatchpointInfo, WatchpointPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
}

/// Executes guest instructions. Implemented outside the monitor.
pub trait ExecutionDriver {
    fn step(&mut self, cpu: &mut CpuState, memory: &mut MemorySystem) -> StepOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested number of steps ran.
    Completed { steps: u64 },
    /// The driver reported the end of the program.
    Halted { steps: u64 },
    /// A watchpoint changed after the last step.
    Watchpoint { steps: u64, hit: WatchpointHit },
}

pub struct Monitor {
    config: MonitorConfig,
    cpu: CpuState,
    memory: MemorySystem,
    watchpoints: WatchpointPool,
    halted: bool,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            cpu: CpuState::new(),
            memory: MemorySystem::new(config.memory_size),
            watchpoints: WatchpointPool::with_capacity(config.watchpoint_capacity),
            halted: false,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemorySystem {
        &mut self.memory
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn view(&mut self) -> MachineView<'_> {
        MachineView::new(&self.cpu, &mut self.memory)
    }

    fn mmu(&mut self) -> SoftMMU<'_> {
        SoftMMU::new(&mut self.memory, self.cpu.paging_mode())
    }

    pub fn evaluate_text(&mut self, input: &str) -> ExprResult<i32> {
        evaluate_text(input, &mut self.view())
    }

    pub fn watch(&mut self, expression: &str) -> Result<WatchpointId, WpError> {
        let mut view = MachineView::new(&self.cpu, &mut self.memory);
        self.watchpoints.create(expression, &mut view)
    }

    pub fn delete_watchpoint(&mut self, id: WatchpointId) -> Result<(), WpError> {
        self.watchpoints.delete(id)
    }

    pub fn watchpoints(&self) -> Vec<WatchpointInfo<'_>> {
        self.watchpoints.list()
    }

    /// Runs up to `count` steps, or until the driver halts when `count` is
    /// `None`. While any watchpoint is set they are re-checked after every
    /// single step and the first change stops the run.
    pub fn run<D: ExecutionDriver>(&mut self, driver: &mut D, count: Option<u64>) -> RunOutcome {
        if self.halted {
            log::info!("program has already halted");
            return RunOutcome::Halted { steps: 0 };
        }

        let mut steps = 0;
        while count.is_none_or(|limit| steps < limit) {
            let outcome = driver.step(&mut self.cpu, &mut self.memory);
            steps += 1;

            if !self.watchpoints.is_empty() {
                let mut view = MachineView::new(&self.cpu, &mut self.memory);
                if let Some(hit) = self.watchpoints.recheck(&mut view) {
                    if outcome == StepOutcome::Halted {
                        self.halted = true;
                    }
                    return RunOutcome::Watchpoint { steps, hit };
                }
            }

            if outcome == StepOutcome::Halted {
                self.halted = true;
                log::info!("program halted at eip 0x{:08X} after {steps} steps", self.cpu.eip);
                return RunOutcome::Halted { steps };
            }
        }
        RunOutcome::Completed { steps }
    }

    /// Evaluates `expr` to a virtual address and reads `count` consecutive
    /// 32-bit words from it, each paired with its address.
    pub fn examine(&mut self, count: usize, expr: &str) -> ExprResult<Vec<(u32, u32)>> {
        let start = self.evaluate_text(expr)? as u32;
        let mut mmu = self.mmu();
        // The operator chooses `count`; the first failed read ends the dump.
        let mut words = Vec::new();
        for i in 0..count {
            let addr = start.wrapping_add((i as u32).wrapping_mul(4));
            let word = mmu.virtual_read(addr, 4).map_err(EvalError::from)?;
            words.push((addr, word));
        }
        Ok(words)
    }

    /// Every named register with its current value, in display order.
    pub fn registers(&self) -> Vec<(&'static str, u32)> {
        self.cpu.snapshot()
    }

    pub fn virtual_read(&mut self, vaddr: u32, width: usize) -> BusResult<u32> {
        self.mmu().virtual_read(vaddr, width)
    }

    pub fn virtual_write(&mut self, vaddr: u32, width: usize, value: u32) -> BusResult<()> {
        self.mmu().virtual_write(vaddr, width, value)
    }

    pub fn raise_interrupt(&mut self, vector: u8, return_addr: u32) -> StateResult<u32> {
        raise_interrupt(&mut self.cpu, &mut self.memory, vector, return_addr)
    }
}
