// Runtime configuration for the dispatcher

use std::time::Duration;

/// Delay between stopping old media and loading new media in a switch
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Name of the confined context's thread
pub const DEFAULT_THREAD_NAME: &str = "reelplay-dispatch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Wait after stop/clear before the new media is loaded. Some decoders
    /// release native buffers asynchronously after a stop.
    pub settle_delay: Duration,
    pub thread_name: String,
}

impl PlayerConfig {
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settle_delay() {
        let config = PlayerConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(50));
        assert_eq!(config.thread_name, "reelplay-dispatch");
    }

    #[test]
    fn test_overrides() {
        let config = PlayerConfig::default()
            .with_settle_delay(Duration::ZERO)
            .with_thread_name("player-test");
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.thread_name, "player-test");
    }
}
