// Buffering policy handed to the engine at construction

use std::time::Duration;

/// Engine buffer thresholds, in milliseconds.
///
/// The shipped values keep decoded-media memory under roughly 50MB on
/// constrained devices; the trade-off is more frequent rebuffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Minimum media duration the engine tries to keep buffered
    pub min_buffer_ms: u32,
    /// Maximum media duration the engine buffers ahead
    pub max_buffer_ms: u32,
    /// Media that must be buffered before playback starts
    pub playback_buffer_ms: u32,
    /// Media that must be buffered to resume after a stall
    pub rebuffer_ms: u32,
}

impl BufferConfig {
    pub const FIXED: BufferConfig = BufferConfig {
        min_buffer_ms: 3_000,
        max_buffer_ms: 10_000,
        playback_buffer_ms: 1_500,
        rebuffer_ms: 3_000,
    };

    /// Thresholds are ordered the way decoders expect them
    pub fn is_consistent(&self) -> bool {
        self.min_buffer_ms <= self.max_buffer_ms
            && self.playback_buffer_ms <= self.min_buffer_ms
            && self.rebuffer_ms <= self.min_buffer_ms
    }

    pub fn max_buffer(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_buffer_ms))
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::FIXED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_values() {
        let config = BufferConfig::default();
        assert_eq!(config.min_buffer_ms, 3000);
        assert_eq!(config.max_buffer_ms, 10000);
        assert_eq!(config.playback_buffer_ms, 1500);
        assert_eq!(config.rebuffer_ms, 3000);
        assert_eq!(config.max_buffer(), Duration::from_secs(10));
    }

    #[test]
    fn test_fixed_policy_is_consistent() {
        assert!(BufferConfig::FIXED.is_consistent());

        let inverted = BufferConfig {
            min_buffer_ms: 12_000,
            ..BufferConfig::FIXED
        };
        assert!(!inverted.is_consistent());
    }
}
