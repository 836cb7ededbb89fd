//! Captured keystroke events

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// App name used when the foreground application cannot be resolved
pub const UNKNOWN_APP: &str = "Unknown";

/// A single normalized key-down, attributed to the foreground application.
///
/// Produced by the capture bridge and consumed exactly once by the consumer
/// loop. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Display name of the application that had focus (e.g. "firefox")
    pub app_name: String,
    /// Canonical key combination (e.g. "Ctrl+Shift+A")
    pub signature: String,
    /// Wall-clock capture time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl CaptureEvent {
    pub fn new(app_name: impl Into<String>, signature: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            app_name: app_name.into(),
            signature: signature.into(),
            timestamp_ms,
        }
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it
pub fn now_wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
