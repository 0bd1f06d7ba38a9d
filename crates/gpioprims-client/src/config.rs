use std::time::Duration;

use gpioprims_transport::{join_host_port, DEFAULT_HOST, DEFAULT_PORT};
use gpioprims_wire::FrameConfig;

/// How negative daemon results reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Negative results become `ClientError::Daemon`.
    #[default]
    Raise,
    /// Negative results are returned as plain values.
    ReturnCode,
}

/// What happens to the daemon-side monitor mask when a callback is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    /// Recompute and push the mask on every add and cancel.
    #[default]
    Exact,
    /// Only push on add, and only ever widen the mask; the daemon keeps
    /// reporting cancelled lines.
    GrowOnly,
}

/// Client connection and behavior settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon host name or address.
    pub host: String,
    /// Daemon TCP port.
    pub port: u16,
    /// Timeout for establishing each connection. `None` blocks.
    pub connect_timeout: Option<Duration>,
    /// Error reporting for typed helpers.
    pub error_mode: ErrorMode,
    /// Monitor mask handling on cancel.
    pub mask_policy: MaskPolicy,
    /// Reader/writer settings for the control connection.
    pub frame: FrameConfig,
}

impl ClientConfig {
    /// Configuration for a daemon at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// The `host:port` address both connections use.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: None,
            error_mode: ErrorMode::default(),
            mask_policy: MaskPolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}
