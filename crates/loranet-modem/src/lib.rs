//! Async driver for UART-attached LoRa modems
//!
//! This crate drives a LoRa radio module through its `AT+` command dialect
//! over a line-oriented serial link. A single read loop demultiplexes the
//! stream into command responses, inbound radio messages and unsolicited
//! error codes, while callers issue commands one at a time through an
//! exclusive command channel.
//!
//! # Architecture
//!
//! 1. **Line Transport** ([`Modem::run_reader`], [`frame`]) - reads
//!    `+...\r\n` frames and routes them by prefix
//! 2. **Command Channel** ([`channel`]) - at most one command in flight,
//!    matched to its response or timeout
//! 3. **Command Schema** ([`schema`]) - per-command parameter contracts and
//!    name aliases, checked before anything is written
//! 4. **Modem Lifecycle** ([`Modem`]) - reset, provisioning, readiness and
//!    fault recovery
//! 5. **Message Inbox** ([`Inbox`]) - received messages plus a "has data"
//!    signal
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // Cargo.toml: loranet-modem = { version = "0.1", features = ["serial"] }
//! use loranet_modem::{Modem, ModemSettingsBuilder, SerialInterface};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ModemSettingsBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .address(7)
//!         .build();
//!
//!     let link = SerialInterface::from_config(&settings.link).open()?;
//!     let (modem, _tasks) = Modem::spawn(link, &settings, None);
//!     modem.wait_ready().await;
//!
//!     modem.send_message("HELLO", 0).await?;
//!     modem.inbox().wait().await;
//!     if let Some(msg) = modem.pop_message() {
//!         println!("{}", msg);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `serial` - Serial port interface (requires `libudev-dev` on Linux)

pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod inbox;
pub mod interface;
pub mod lifecycle;
pub mod schema;
pub mod setting;
pub mod test_utils;

pub use channel::CommandChannel;
pub use config::{
    BandSetting, LinkConfig, ModemConfig, ModemSettings, ModemSettingsBuilder, Modulation,
    RecoveryConfig, TimingConfig,
};
pub use error::{ModemError, Result};
pub use frame::{ErrorRecord, Frame, RadioMessage};
pub use inbox::Inbox;
pub use interface::{list_ports, DeviceInfo, Link, ResetLine};
pub use lifecycle::{Fault, Modem, ModemState, ModemStats, ModemTasks, ModuleInfo};
pub use schema::{AtCommand, CommandName, ParamValue, BROADCAST_ADDRESS, MAX_PAYLOAD};
pub use setting::Setting;
pub use test_utils::{MockModem, MockResetLine};

#[cfg(feature = "serial")]
pub use interface::SerialInterface;
