//! Engine configuration supplied by the caller

use serde::{Deserialize, Serialize};

/// Global flush engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of each destination's completion notification channel.
    /// Writes to a full channel fail and the event is dropped.
    pub notification_capacity: usize,

    /// Initial capacity of the coroutine arena.
    pub coroutine_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_capacity: 64,
            coroutine_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.notification_capacity, 64);
        assert_eq!(config.coroutine_capacity, 32);
    }
}
