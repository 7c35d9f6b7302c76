//! Serial port link to the modem
//!
//! Opens the UART with tokio-serial and hands both halves to the driver.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use crate::config::{LinkConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_SECS};
use crate::error::{ModemError, Result};
use crate::interface::Link;

/// Serial interface to a UART-attached modem
#[derive(Debug, Clone)]
pub struct SerialInterface {
    /// Serial port path
    port_path: PathBuf,

    /// Baud rate
    baud_rate: u32,

    /// Port timeout
    timeout: Duration,
}

impl SerialInterface {
    /// Create a new serial interface
    pub fn new(port: impl AsRef<Path>) -> Self {
        Self {
            port_path: port.as_ref().to_path_buf(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Create from link configuration
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(&config.port).with_baud_rate(config.baud_rate)
    }

    /// Create with custom baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Create with custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the port path
    pub fn port_path(&self) -> &Path {
        &self.port_path
    }

    /// Open the port and split it into a link
    pub fn open(&self) -> Result<Link> {
        info!(port = %self.port_path.display(), baud = self.baud_rate, "Opening serial port");

        if !self.port_path.exists() {
            return Err(ModemError::PortNotFound(
                self.port_path.display().to_string(),
            ));
        }

        let stream = tokio_serial::new(self.port_path.to_string_lossy(), self.baud_rate)
            .timeout(self.timeout)
            .open_native_async()
            .map_err(|e| ModemError::PortOpenFailed {
                port: self.port_path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Link::new(
            stream,
            format!("serial:{}", self.port_path.display()),
        ))
    }
}
