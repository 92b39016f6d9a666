use std::time::Duration;

use crate::{DEFAULT_CLOSE_TIMEOUT, MAX_FRAME_PAYLOAD, MAX_MESSAGE_SIZE};

/// Per-connection limits and timeouts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for the peer to echo our Close frame before the transport is
    /// torn down.
    pub close_timeout: Duration,
    /// Largest payload accepted in a single frame. Outbound data larger than this is
    /// fragmented.
    pub max_frame_size: usize,
    /// Largest reassembled message accepted.
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_frame_size: MAX_FRAME_PAYLOAD,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.close_timeout, Duration::from_millis(5000));
        assert_eq!(config.max_frame_size, 0xFFFF);
        assert_eq!(config.max_message_size, 0x10_0000);
    }

    #[test]
    fn setters_override() {
        let config = Config::default()
            .with_close_timeout(Duration::from_secs(1))
            .with_max_frame_size(16)
            .with_max_message_size(64);
        assert_eq!(config.close_timeout, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, 16);
        assert_eq!(config.max_message_size, 64);
    }
}
