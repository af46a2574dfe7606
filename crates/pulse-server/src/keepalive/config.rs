//! Keepalive timing and limits.

use std::time::Duration;

use pulse_settings::KeepaliveSettings;

/// Timing and size limits shared by the reader and the emitter of one
/// connection. Fixed for the life of the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Read deadline window, measured from the last inbound activity.
    pub window: Duration,
    /// Bound on each outbound send.
    pub write_timeout: Duration,
    /// Largest inbound frame accepted.
    pub max_frame_bytes: usize,
}

impl KeepaliveConfig {
    /// Interval between probes: 9/10 of the read window, so a probe always
    /// goes out before the deadline can lapse.
    pub fn heartbeat_period(&self) -> Duration {
        self.window * 9 / 10
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self::from(&KeepaliveSettings::default())
    }
}

impl From<&KeepaliveSettings> for KeepaliveConfig {
    fn from(settings: &KeepaliveSettings) -> Self {
        Self {
            window: settings.window(),
            write_timeout: settings.write_timeout(),
            max_frame_bytes: settings.max_frame_bytes,
        }
    }
}
