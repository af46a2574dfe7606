//! Server configuration.

use pulse_settings::PulseSettings;

use crate::keepalive::KeepaliveConfig;

/// Configuration for the pulse server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Read buffer size applied to each upgrade, in bytes.
    pub read_buffer_size: usize,
    /// Write buffer size applied to each upgrade, in bytes.
    pub write_buffer_size: usize,
    /// Keepalive timing and frame cap.
    pub keepalive: KeepaliveConfig,
}

impl ServerConfig {
    /// `host:port` as given to the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&PulseSettings::default())
    }
}

impl From<&PulseSettings> for ServerConfig {
    fn from(settings: &PulseSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            read_buffer_size: settings.server.read_buffer_size,
            write_buffer_size: settings.server.write_buffer_size,
            keepalive: KeepaliveConfig::from(&settings.keepalive),
        }
    }
}
