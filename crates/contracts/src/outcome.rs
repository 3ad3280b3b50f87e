//! FlushOutcome - result of one delivery attempt
//!
//! The numeric codes are part of the completion protocol wire word and must
//! not change.

/// Outcome reported by a destination flush callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlushOutcome {
    /// Delivery failed permanently
    Error = 0,
    /// Delivery succeeded
    Ok = 1,
    /// Transient failure, scheduler may retry
    Retry = 2,
}

impl FlushOutcome {
    /// Wire code for this outcome.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Error),
            1 => Some(Self::Ok),
            2 => Some(Self::Retry),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Ok => "ok",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for outcome in [FlushOutcome::Error, FlushOutcome::Ok, FlushOutcome::Retry] {
            assert_eq!(FlushOutcome::from_code(outcome.code()), Some(outcome));
        }
        assert_eq!(FlushOutcome::from_code(3), None);
    }
}
