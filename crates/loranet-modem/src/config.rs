//! Configuration types for the modem driver
//!
//! This module provides configuration structures for the serial link, the
//! radio parameters provisioned during initialization, driver timing and
//! fault recovery.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ModemError, Result};
use crate::schema::{megahertz_to_hertz, region_megahertz};

/// Default baud rate of the modem UART
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default per-read timeout of the line transport
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

/// Default command round-trip timeout
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Default node address
pub const DEFAULT_ADDRESS: u16 = 2;

/// Default network id
pub const DEFAULT_NETWORK_ID: u8 = 18;

/// Complete driver settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModemSettings {
    /// Serial link
    #[serde(default)]
    pub link: LinkConfig,

    /// Radio parameters provisioned on initialization
    #[serde(default)]
    pub radio: ModemConfig,

    /// Driver timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Fault recovery
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Path to serial port (e.g., /dev/ttyUSB0, COM3)
    pub port: PathBuf,
    /// Baud rate (default: 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Radio parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Node address (0..=65535)
    #[serde(default = "default_address")]
    pub address: u16,

    /// Network id
    #[serde(default = "default_network_id")]
    pub network_id: u8,

    /// Shared network password (up to 8 hex digits); skipped when unset
    #[serde(default)]
    pub password: Option<String>,

    /// Frequency band
    #[serde(default)]
    pub band: BandSetting,

    /// RF output power in dBm; skipped when unset
    #[serde(default)]
    pub power: Option<u8>,

    /// Modulation parameters
    #[serde(default)]
    pub modulation: Modulation,
}

fn default_address() -> u16 {
    DEFAULT_ADDRESS
}

fn default_network_id() -> u8 {
    DEFAULT_NETWORK_ID
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            network_id: DEFAULT_NETWORK_ID,
            password: None,
            band: BandSetting::default(),
            power: None,
            modulation: Modulation::default(),
        }
    }
}

/// Band given as raw Hz, a MHz multiplier or a region code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BandSetting {
    /// Frequency in Hz
    Hertz(u64),
    /// Frequency in MHz
    Megahertz(f64),
    /// Region code such as `EU` or `US`
    Region(String),
}

impl BandSetting {
    /// Resolve to an integer frequency in Hz
    pub fn to_hertz(&self) -> Result<u64> {
        match self {
            BandSetting::Hertz(hz) => Ok(*hz),
            BandSetting::Megahertz(mhz) => Ok(megahertz_to_hertz(*mhz)),
            BandSetting::Region(code) => region_megahertz(code)
                .map(megahertz_to_hertz)
                .ok_or_else(|| ModemError::UnknownBand(code.clone())),
        }
    }

    /// Parse user input: integer Hz, decimal MHz, or a region code
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(hz) = input.parse::<u64>() {
            return BandSetting::Hertz(hz);
        }
        if let Ok(mhz) = input.parse::<f64>() {
            return BandSetting::Megahertz(mhz);
        }
        BandSetting::Region(input.to_string())
    }
}

impl Default for BandSetting {
    fn default() -> Self {
        BandSetting::Region("US".to_string())
    }
}

impl fmt::Display for BandSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandSetting::Hertz(hz) => write!(f, "{}", hz),
            BandSetting::Megahertz(mhz) => write!(f, "{}", mhz),
            BandSetting::Region(code) => f.write_str(code),
        }
    }
}

/// LoRa modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modulation {
    /// Spreading factor (5..=11)
    pub spreading_factor: u8,
    /// Bandwidth index (7..=9)
    pub bandwidth: u8,
    /// Coding rate (1..=4)
    pub coding_rate: u8,
    /// Preamble length (12)
    pub preamble_length: u8,
}

impl Modulation {
    /// Check the spreading factor / bandwidth pairing
    pub fn check_compatible(&self) -> Result<()> {
        if i16::from(self.spreading_factor) - 2 > i16::from(self.bandwidth) {
            return Err(ModemError::IncompatibleModulation {
                spreading_factor: self.spreading_factor,
                bandwidth: self.bandwidth,
            });
        }
        Ok(())
    }
}

impl Default for Modulation {
    fn default() -> Self {
        Self {
            spreading_factor: 11,
            bandwidth: 9,
            coding_rate: 1,
            preamble_length: 12,
        }
    }
}

/// Driver timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Per-read timeout of the line transport
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Command round-trip timeout
    #[serde(with = "humantime_serde", default = "default_command_timeout")]
    pub command_timeout: Duration,

    /// How long the reset line is held low
    #[serde(with = "humantime_serde", default = "default_reset_hold")]
    pub reset_hold: Duration,

    /// Settle time after releasing the reset line
    #[serde(with = "humantime_serde", default = "default_reset_settle")]
    pub reset_settle: Duration,

    /// How long to wait for the `READY` status after a reset
    #[serde(with = "humantime_serde", default = "default_ready_timeout")]
    pub ready_timeout: Duration,
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS)
}

fn default_command_timeout() -> Duration {
    Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS)
}

fn default_reset_hold() -> Duration {
    Duration::from_millis(100)
}

fn default_reset_settle() -> Duration {
    Duration::from_millis(50)
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_timeout: default_read_timeout(),
            command_timeout: default_command_timeout(),
            reset_hold: default_reset_hold(),
            reset_settle: default_reset_settle(),
            ready_timeout: default_ready_timeout(),
        }
    }
}

/// Fault recovery behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Attempts per fault before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(with = "humantime_serde", default = "default_backoff")]
    pub backoff: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

/// Builder for ModemSettings
#[derive(Debug, Default)]
pub struct ModemSettingsBuilder {
    settings: ModemSettings,
}

impl ModemSettingsBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set serial port path
    pub fn serial_port(mut self, port: impl Into<PathBuf>) -> Self {
        self.settings.link.port = port.into();
        self
    }

    /// Set serial baud rate
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.link.baud_rate = baud_rate;
        self
    }

    /// Set node address
    pub fn address(mut self, address: u16) -> Self {
        self.settings.radio.address = address;
        self
    }

    /// Set network id
    pub fn network_id(mut self, network_id: u8) -> Self {
        self.settings.radio.network_id = network_id;
        self
    }

    /// Set network password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.settings.radio.password = Some(password.into());
        self
    }

    /// Set band
    pub fn band(mut self, band: BandSetting) -> Self {
        self.settings.radio.band = band;
        self
    }

    /// Set RF output power
    pub fn power(mut self, power: u8) -> Self {
        self.settings.radio.power = Some(power);
        self
    }

    /// Set modulation parameters
    pub fn modulation(mut self, modulation: Modulation) -> Self {
        self.settings.radio.modulation = modulation;
        self
    }

    /// Set command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timing.command_timeout = timeout;
        self
    }

    /// Set per-read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timing.read_timeout = timeout;
        self
    }

    /// Set reset hold and settle times
    pub fn reset_timing(mut self, hold: Duration, settle: Duration) -> Self {
        self.settings.timing.reset_hold = hold;
        self.settings.timing.reset_settle = settle;
        self
    }

    /// Set how long to wait for `READY`
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timing.ready_timeout = timeout;
        self
    }

    /// Set recovery attempts and backoff
    pub fn recovery(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.settings.recovery.max_attempts = max_attempts;
        self.settings.recovery.backoff = backoff;
        self
    }

    /// Build the settings
    pub fn build(self) -> ModemSettings {
        self.settings
    }
}

/// Serde adapter for `Duration` fields written as `"60s"`, `"5m"`
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as a human-readable duration
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    /// Parse a human-readable duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
