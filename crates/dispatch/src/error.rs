//! Dispatch error types

use thiserror::Error;

/// Flush engine errors surfaced to the scheduler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Destination id was never registered
    #[error("unknown destination id {id}")]
    UnknownDestination { id: usize },

    /// No coroutine registered under (task, coroutine)
    #[error("unknown flush coroutine: task={task_id} coroutine={coroutine_id}")]
    UnknownCoroutine { task_id: u16, coroutine_id: u8 },

    /// Coroutine is not in a state valid for the requested transition
    #[error("coroutine task={task_id} coroutine={coroutine_id}: {message}")]
    InvalidState {
        task_id: u16,
        coroutine_id: u8,
        message: String,
    },

    /// A completion word failed to decode
    #[error("completion protocol error: {message}")]
    Protocol { message: String },

    /// No free id available for a new task or coroutine
    #[error("flush id space exhausted: {message}")]
    Exhausted { message: String },

    /// Contract-level error
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatchError {
    /// Create an invalid-state error
    pub fn invalid_state(task_id: u16, coroutine_id: u8, message: impl Into<String>) -> Self {
        Self::InvalidState {
            task_id,
            coroutine_id,
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an exhausted-ids error
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::Exhausted {
            message: message.into(),
        }
    }
}
