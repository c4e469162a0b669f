use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_core::ChannelId;

use crate::endpoint::network::LinkSettings;
use crate::error::{Error, Result};
use crate::transport::DEFAULT_MAX_FRAME_BYTES;

/// Fabric settings
///
/// ```toml
/// queue_capacity = 1024
/// send_timeout_ms = 10
///
/// [[channels]]
/// service_type = "readout"
/// service_name = "link0"
/// topic = ""
/// address = "127.0.0.1:9000"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Capacity of each in-process queue, and of each network receive buffer
    pub queue_capacity: usize,
    /// Longest a send waits for room before reporting `false`
    pub send_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Upper bound on how long a delivery loop waits before re-checking for stop
    pub callback_poll_ms: u64,
    pub max_frame_bytes: usize,
    /// Channels served by the network transport
    pub channels: Vec<ChannelRoute>,
}

/// Network address of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRoute {
    #[serde(flatten)]
    pub channel: ChannelId,
    pub address: SocketAddr,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            send_timeout_ms: 10,
            connect_timeout_ms: 1000,
            callback_poll_ms: 100,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            channels: Vec::new(),
        }
    }
}

impl FabricConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        if self.callback_poll_ms == 0 {
            return Err(Error::Config("callback_poll_ms must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for route in &self.channels {
            if !seen.insert(&route.channel) {
                return Err(Error::Config(format!(
                    "channel {} is routed more than once",
                    route.channel
                )));
            }
        }
        Ok(())
    }

    /// Add a network route
    pub fn route(mut self, channel: ChannelId, address: SocketAddr) -> Self {
        self.channels.push(ChannelRoute { channel, address });
        self
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn callback_poll(&self) -> Duration {
        Duration::from_millis(self.callback_poll_ms)
    }

    pub(crate) fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            connect_timeout: self.connect_timeout(),
            send_timeout: self.send_timeout(),
            max_frame_bytes: self.max_frame_bytes,
            buffer_capacity: self.queue_capacity,
            poll_interval: self.callback_poll(),
        }
    }
}
