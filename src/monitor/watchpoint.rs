//! Fixed-capacity watchpoint pool.
//!
//! Slots live in one preallocated vector. Two singly linked lists thread
//! through it by index: the active list (newest first) and the free list.
//! Each slot carries a tag saying which list it belongs to, so membership can
//! be verified with [`WatchpointPool::check_invariants`].

use std::fmt;

use super::error::{ExprError, ExprResult, LexError, WpError};
use super::expr::{Evaluator, ExprContext};
use super::lexer::{TokenStream, retag_unary, tokenize};

pub const DEFAULT_WATCHPOINT_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchpointId(pub usize);

impl WatchpointId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WatchpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reported by [`WatchpointPool::recheck`] for the first watchpoint whose
/// value moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchpointHit {
    pub id: WatchpointId,
    pub previous: i32,
    pub current: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchpointInfo<'a> {
    pub id: WatchpointId,
    pub expression: &'a str,
    pub last_value: i32,
    /// False until the expression has evaluated successfully once.
    pub resolved: bool,
}

struct Watchpoint {
    expression: String,
    last_value: i32,
    resolved: bool,
}

enum SlotState {
    Free,
    Active(Watchpoint),
}

struct Slot {
    next: Option<usize>,
    state: SlotState,
}

pub struct WatchpointPool {
    slots: Vec<Slot>,
    active_head: Option<usize>,
    free_head: Option<usize>,
    active_len: usize,
}

impl Default for WatchpointPool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WATCHPOINT_CAPACITY)
    }
}

impl WatchpointPool {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|index| Slot {
                next: (index + 1 < capacity).then_some(index + 1),
                state: SlotState::Free,
            })
            .collect();
        Self {
            slots,
            active_head: None,
            free_head: (capacity > 0).then_some(0),
            active_len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.active_len
    }

    pub fn is_empty(&self) -> bool {
        self.active_len == 0
    }

    /// Registers `text` and seeds its value from `context`.
    ///
    /// Text that does not tokenize is rejected without consuming a slot. Text
    /// that tokenizes but cannot be evaluated yet is still registered as
    /// unresolved; its first successful evaluation is reported as a change.
    pub fn create<C: ExprContext>(
        &mut self,
        text: &str,
        context: &mut C,
    ) -> Result<WatchpointId, WpError> {
        let tokens = compile(text)?;
        let index = self.free_head.ok_or(WpError::PoolExhausted {
            capacity: self.capacity(),
        })?;

        let (last_value, resolved) = match Evaluator::new(context).evaluate(&tokens) {
            Ok(value) => (value, true),
            Err(err) => {
                log::warn!("watchpoint {index} ({text}) cannot be evaluated yet: {err}");
                (0, false)
            }
        };

        let slot = &mut self.slots[index];
        self.free_head = slot.next;
        slot.next = self.active_head;
        slot.state = SlotState::Active(Watchpoint {
            expression: text.to_string(),
            last_value,
            resolved,
        });
        self.active_head = Some(index);
        self.active_len += 1;

        log::info!("watchpoint {index} set on {text} = {last_value:#x}");
        Ok(WatchpointId(index))
    }

    pub fn delete(&mut self, id: WatchpointId) -> Result<(), WpError> {
        let mut prev: Option<usize> = None;
        let mut cursor = self.active_head;
        while let Some(index) = cursor {
            if index == id.index() {
                break;
            }
            prev = Some(index);
            cursor = self.slots[index].next;
        }
        let index = cursor.ok_or(WpError::NotFound(id.index()))?;

        let next = self.slots[index].next;
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.active_head = next,
        }
        let slot = &mut self.slots[index];
        slot.state = SlotState::Free;
        slot.next = self.free_head;
        self.free_head = Some(index);
        self.active_len -= 1;

        log::info!("watchpoint {index} deleted");
        Ok(())
    }

    /// Active watchpoints, most recently created first.
    pub fn list(&self) -> Vec<WatchpointInfo<'_>> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = WatchpointInfo<'_>> + '_ {
        let mut cursor = self.active_head;
        std::iter::from_fn(move || {
            while let Some(index) = cursor {
                let slot = &self.slots[index];
                cursor = slot.next;
                if let SlotState::Active(wp) = &slot.state {
                    return Some(WatchpointInfo {
                        id: WatchpointId(index),
                        expression: &wp.expression,
                        last_value: wp.last_value,
                        resolved: wp.resolved,
                    });
                }
            }
            None
        })
    }

    /// Re-evaluates active watchpoints in list order and stops at the first
    /// whose value changed, storing the new value. Evaluation failures are
    /// logged and count as unchanged.
    pub fn recheck<C: ExprContext>(&mut self, context: &mut C) -> Option<WatchpointHit> {
        let mut evaluator = Evaluator::new(context);
        let mut cursor = self.active_head;
        while let Some(index) = cursor {
            let slot = &mut self.slots[index];
            cursor = slot.next;
            let SlotState::Active(wp) = &mut slot.state else {
                continue;
            };

            // Tokens are rebuilt from the text on every pass.
            let evaluated: ExprResult<i32> = compile(&wp.expression)
                .map_err(ExprError::from)
                .and_then(|tokens| evaluator.evaluate(&tokens).map_err(ExprError::from));
            let current = match evaluated {
                Ok(value) => value,
                Err(err) => {
                    log::warn!("watchpoint {index} ({}) failed to evaluate: {err}", wp.expression);
                    continue;
                }
            };
            if wp.resolved && current == wp.last_value {
                continue;
            }

            let previous = wp.last_value;
            wp.last_value = current;
            wp.resolved = true;
            log::info!(
                "watchpoint {index} triggered: {} changed from {previous:#x} to {current:#x}",
                wp.expression
            );
            return Some(WatchpointHit {
                id: WatchpointId(index),
                previous,
                current,
            });
        }
        None
    }

    /// Verifies that every slot sits on exactly one list and that its tag
    /// agrees with that list.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = vec![false; self.slots.len()];
        let mut walk = |head: Option<usize>, active: bool| -> Result<usize, String> {
            let mut count = 0;
            let mut cursor = head;
            while let Some(index) = cursor {
                let slot = self.slots.get(index).ok_or(format!("link to missing slot {index}"))?;
                if std::mem::replace(&mut seen[index], true) {
                    return Err(format!("slot {index} reached twice"));
                }
                if matches!(slot.state, SlotState::Active(_)) != active {
                    let list = if active { "active" } else { "free" };
                    return Err(format!("slot {index} on the {list} list has the wrong tag"));
                }
                count += 1;
                cursor = slot.next;
            }
            Ok(count)
        };

        let active = walk(self.active_head, true)?;
        let free = walk(self.free_head, false)?;
        if active != self.active_len {
            return Err(format!("active list has {active} slots, expected {}", self.active_len));
        }
        if active + free != self.slots.len() {
            return Err(format!(
                "{} slots are on neither list",
                self.slots.len() - active - free
            ));
        }
        Ok(())
    }
}

fn compile(text: &str) -> Result<TokenStream, LexError> {
    let mut tokens = tokenize(text)?;
    retag_unary(&mut tokens);
    Ok(tokens)
}
