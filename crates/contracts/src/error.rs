//! Layered error definitions
//!
//! Crate-specific failures live in their own crates (e.g. the dispatch
//! error enum); this is the shared floor they can fold into.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    /// A path pattern string failed to compile
    #[error("pattern compile error for '{pattern}': {message}")]
    PatternCompile { pattern: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create a pattern compile error
    pub fn pattern_compile(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PatternCompile {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
