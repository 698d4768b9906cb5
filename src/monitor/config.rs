use crate::soc::bus::DEFAULT_PMEM_SIZE;

use super::watchpoint::DEFAULT_WATCHPOINT_CAPACITY;

/// Sizing for a [`Monitor`](super::Monitor) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Bytes of guest RAM, mapped from physical address zero.
    pub memory_size: usize,
    pub watchpoint_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_PMEM_SIZE,
            watchpoint_capacity: DEFAULT_WATCHPOINT_CAPACITY,
        }
    }
}

impl MonitorConfig {
    pub fn memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    pub fn watchpoint_capacity(mut self, slots: usize) -> Self {
        self.watchpoint_capacity = slots;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_machine() {
        let config = MonitorConfig::default();
        assert_eq!(config.memory_size, 128 * 1024 * 1024);
        assert_eq!(config.watchpoint_capacity, 32);
    }

    #[test]
    fn setters_chain() {
        let config = MonitorConfig::default().memory_size(0x4000).watchpoint_capacity(4);
        assert_eq!(config, MonitorConfig { memory_size: 0x4000, watchpoint_capacity: 4 });
    }
}
