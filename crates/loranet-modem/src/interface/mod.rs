//! Platform collaborators of the driver
//!
//! The driver consumes a raw byte stream (split into read and write halves)
//! and, optionally, a hardware reset control line:
//!
//! - [`Link`] - the two halves of any `AsyncRead + AsyncWrite` stream
//! - [`ResetLine`] - a pin that holds the module in reset while low
//! - [`serial::SerialInterface`] - a UART link (requires `serial` feature)
//!
//! # Feature Requirements
//!
//! - `serial`: Requires `libudev-dev` and `pkg-config` on Linux
//!   ```bash
//!   # Ubuntu/Debian
//!   apt install libudev-dev pkg-config
//!   ```

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialInterface;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::channel::BoxedWriter;
use crate::error::Result;

/// Read half of the serial link
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Both halves of the byte stream to the module
pub struct Link {
    /// Frames from the module
    pub reader: BoxedReader,
    /// Command lines to the module
    pub writer: BoxedWriter,
    /// Link name for logging
    pub name: String,
}

impl Link {
    /// Split a duplex stream into a link
    pub fn new<S>(stream: S, name: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            name: name.into(),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("name", &self.name).finish()
    }
}

/// Hardware reset control line
///
/// Driving the line low holds the module in reset; releasing it high lets
/// the module boot and announce `+READY`.
#[async_trait]
pub trait ResetLine: Send + Sync {
    /// Drive the line low
    async fn set_low(&mut self) -> Result<()>;

    /// Drive the line high
    async fn set_high(&mut self) -> Result<()>;

    /// Line name (for logging)
    fn name(&self) -> &str;
}

/// Information about a detected serial device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Path to the device (e.g., /dev/ttyUSB0)
    pub path: String,
    /// Device type description
    pub device_type: String,
    /// USB Vendor ID (if available)
    pub vendor_id: Option<u16>,
    /// USB Product ID (if available)
    pub product_id: Option<u16>,
    /// Product name (if available)
    pub product_name: Option<String>,
    /// Manufacturer (if available)
    pub manufacturer: Option<String>,
}

impl DeviceInfo {
    #[cfg(feature = "serial")]
    fn from_serial_port(port: &serialport::SerialPortInfo) -> Self {
        use serialport::SerialPortType;

        let (device_type, vendor_id, product_id, product_name, manufacturer) =
            match &port.port_type {
                SerialPortType::UsbPort(usb) => (
                    "USB".to_string(),
                    Some(usb.vid),
                    Some(usb.pid),
                    usb.product.clone(),
                    usb.manufacturer.clone(),
                ),
                SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None),
                SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None, None),
                SerialPortType::Unknown => ("Unknown".to_string(), None, None, None, None),
            };

        Self {
            path: port.port_name.clone(),
            device_type,
            vendor_id,
            product_id,
            product_name,
            manufacturer,
        }
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.path, self.device_type)?;
        if let (Some(vid), Some(pid)) = (self.vendor_id, self.product_id) {
            write!(f, " {:04x}:{:04x}", vid, pid)?;
        }
        if let Some(product) = &self.product_name {
            write!(f, " {}", product)?;
        }
        Ok(())
    }
}

/// List serial ports present on this machine
pub fn list_ports() -> Result<Vec<DeviceInfo>> {
    #[cfg(feature = "serial")]
    {
        let ports = serialport::available_ports()?;
        Ok(ports.iter().map(DeviceInfo::from_serial_port).collect())
    }

    #[cfg(not(feature = "serial"))]
    {
        tracing::warn!("Serial feature not enabled, cannot list serial ports");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            path: "/dev/ttyUSB0".to_string(),
            device_type: "USB".to_string(),
            vendor_id: Some(0x10c4),
            product_id: Some(0xea60),
            product_name: Some("CP2102".to_string()),
            manufacturer: None,
        };
        assert_eq!(info.to_string(), "/dev/ttyUSB0 [USB] 10c4:ea60 CP2102");
    }

    #[tokio::test]
    async fn test_link_from_duplex() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (near, mut far) = tokio::io::duplex(64);
        let mut link = Link::new(near, "duplex");
        link.writer.write_all(b"AT\r\n").await.unwrap();

        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"AT\r\n");
        assert_eq!(link.name, "duplex");
    }
}
