//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and size limits for one [`DeviceSession`](crate::DeviceSession).
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest wait for the first reply byte, and for each further chunk of
    /// a binary payload.
    pub read_timeout_ms: u64,
    /// Silence that completes a text reply.
    pub quiescence_ms: u64,
    /// Upper bound for a single transport read.
    pub max_read_size: usize,
    /// Declared binary lengths above this are rejected.
    pub max_payload_len: usize,
    /// Text replies longer than this are rejected.
    pub max_text_len: usize,
    /// After a frame completes, wait one quiescence window and fail if more
    /// bytes arrive.
    pub reject_trailing_bytes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            read_timeout_ms: 1000,
            quiescence_ms: 50,
            max_read_size: 2048,
            max_payload_len: 1 << 20,
            max_text_len: 64 * 1024,
            reject_trailing_bytes: true,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from JSON, defaulting missing fields.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Quiescence window as a [`Duration`].
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    /// Read chunk size, never zero.
    pub fn read_size(&self) -> usize {
        self.max_read_size.max(1)
    }
}
