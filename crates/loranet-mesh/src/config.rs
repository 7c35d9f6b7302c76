//! Peer discovery configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MeshError, Result};
use loranet_modem::config::humantime_serde;
use loranet_modem::MAX_PAYLOAD;

/// Default interval between beacons
pub const DEFAULT_BEACON_INTERVAL_SECS: u64 = 60;

/// Default peer staleness window
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 300;

/// Default beacon payload
pub const DEFAULT_BEACON_MESSAGE: &str = "HELLO";

/// Default shared secret
pub const DEFAULT_KEY: &str = "zen";

/// Peer discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Interval between beacons
    #[serde(with = "humantime_serde", default = "default_beacon_interval")]
    pub beacon_interval: Duration,

    /// Peers not heard from within this window are evicted
    #[serde(with = "humantime_serde", default = "default_client_timeout")]
    pub client_timeout: Duration,

    /// Beacon payload
    #[serde(default = "default_beacon_message")]
    pub beacon_message: String,

    /// Shared network secret
    #[serde(default = "default_key")]
    pub key: String,

    /// Capacity of the mesh event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_beacon_interval() -> Duration {
    Duration::from_secs(DEFAULT_BEACON_INTERVAL_SECS)
}

fn default_client_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS)
}

fn default_beacon_message() -> String {
    DEFAULT_BEACON_MESSAGE.to_string()
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

fn default_event_capacity() -> usize {
    64
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            beacon_interval: default_beacon_interval(),
            client_timeout: default_client_timeout(),
            beacon_message: default_beacon_message(),
            key: default_key(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl MeshConfig {
    /// Check the configuration before starting a node
    pub fn validate(&self) -> Result<()> {
        if self.beacon_interval.is_zero() {
            return Err(MeshError::InvalidConfig(
                "beacon_interval must be non-zero".to_string(),
            ));
        }
        if self.client_timeout.is_zero() {
            return Err(MeshError::InvalidConfig(
                "client_timeout must be non-zero".to_string(),
            ));
        }
        if self.beacon_message.is_empty() {
            return Err(MeshError::InvalidConfig(
                "beacon_message must not be empty".to_string(),
            ));
        }
        if self.beacon_message.len() > MAX_PAYLOAD
            || !self
                .beacon_message
                .chars()
                .all(|c| c.is_ascii() && c != '\r' && c != '\n')
        {
            return Err(MeshError::InvalidConfig(format!(
                "beacon_message must be single-line ascii of at most {} bytes",
                MAX_PAYLOAD
            )));
        }
        if self.key.is_empty() {
            return Err(MeshError::InvalidConfig("key must not be empty".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(MeshError::InvalidConfig(
                "event_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for MeshConfig
#[derive(Debug, Default)]
pub struct MeshConfigBuilder {
    config: MeshConfig,
}

impl MeshConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set beacon interval
    pub fn beacon_interval(mut self, interval: Duration) -> Self {
        self.config.beacon_interval = interval;
        self
    }

    /// Set peer staleness window
    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.config.client_timeout = timeout;
        self
    }

    /// Set beacon payload
    pub fn beacon_message(mut self, message: impl Into<String>) -> Self {
        self.config.beacon_message = message.into();
        self
    }

    /// Set shared secret
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = key.into();
        self
    }

    /// Set event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> MeshConfig {
        self.config
    }
}
