//! Completion protocol - fixed-width outcome words
//!
//! Each flush signals its completion to the scheduler as one `u64` word on
//! the destination's notification channel. The scheduler demultiplexes
//! events from many destinations on a shared surface, so this bit layout is
//! a contract:
//!
//! ```text
//!  63           36 35    32 31      24 23            8 7           0
//! ┌───────────────┬────────┬──────────┬───────────────┬─────────────┐
//! │    unused     │ class  │ outcome  │    task id    │ coroutine id│
//! └───────────────┴────────┴──────────┴───────────────┴─────────────┘
//! ```

use contracts::FlushOutcome;

use crate::error::DispatchError;

/// Event-class tag identifying a flush/task completion.
pub const EVENT_CLASS_FLUSH: u8 = 2;

/// A decoded completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub task_id: u16,
    pub coroutine_id: u8,
    pub outcome: FlushOutcome,
}

impl CompletionEvent {
    pub fn new(task_id: u16, coroutine_id: u8, outcome: FlushOutcome) -> Self {
        Self {
            task_id,
            coroutine_id,
            outcome,
        }
    }

    /// Pack into the wire word.
    pub fn encode(&self) -> u64 {
        let set = (u32::from(self.outcome.code()) << 24)
            | (u32::from(self.task_id) << 8)
            | u32::from(self.coroutine_id);
        (u64::from(EVENT_CLASS_FLUSH) << 32) | u64::from(set)
    }

    /// Unpack a wire word.
    pub fn decode(word: u64) -> Result<Self, DispatchError> {
        let class = ((word >> 32) & 0xf) as u8;
        if class != EVENT_CLASS_FLUSH {
            return Err(DispatchError::protocol(format!(
                "unexpected event class {class}"
            )));
        }
        let set = word as u32;
        let outcome_code = (set >> 24) as u8;
        let outcome = FlushOutcome::from_code(outcome_code).ok_or_else(|| {
            DispatchError::protocol(format!("unknown outcome code {outcome_code}"))
        })?;
        Ok(Self {
            task_id: (set >> 8) as u16,
            coroutine_id: set as u8,
            outcome,
        })
    }
}
