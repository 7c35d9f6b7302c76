//! Node configuration: JSON file plus command-line overrides

use anyhow::Context;
use loranet_mesh::MeshConfig;
use loranet_modem::{BandSetting, ModemSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a node needs, as read from `--config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Modem driver settings
    #[serde(default)]
    pub modem: ModemSettings,

    /// Peer discovery settings
    #[serde(default)]
    pub mesh: MeshConfig,
}

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<PathBuf>,
    pub baud_rate: Option<u32>,
    pub address: Option<u16>,
    pub network_id: Option<u8>,
    pub password: Option<String>,
    pub band: Option<String>,
    pub key: Option<String>,
}

impl NodeConfig {
    /// Read a JSON config file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load the file if given, then apply overrides and validate
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config
            .mesh
            .validate()
            .context("Invalid mesh configuration")?;
        Ok(config)
    }

    fn apply(&mut self, overrides: Overrides) {
        let link = &mut self.modem.link;
        if let Some(port) = overrides.port {
            link.port = port;
        }
        if let Some(baud_rate) = overrides.baud_rate {
            link.baud_rate = baud_rate;
        }

        let radio = &mut self.modem.radio;
        if let Some(address) = overrides.address {
            radio.address = address;
        }
        if let Some(network_id) = overrides.network_id {
            radio.network_id = network_id;
        }
        if let Some(password) = overrides.password {
            radio.password = Some(password);
        }
        if let Some(band) = overrides.band {
            radio.band = BandSetting::parse(&band);
        }

        if let Some(key) = overrides.key {
            self.mesh.key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "modem": {
                "link": { "port": "/dev/ttyACM0" },
                "radio": { "address": 7, "band": "EU" },
                "timing": { "command_timeout": "2s" }
            },
            "mesh": { "beacon_interval": "30s" }
        }"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.modem.link.port, PathBuf::from("/dev/ttyACM0"));
        assert_eq!(config.modem.link.baud_rate, 115200);
        assert_eq!(config.modem.radio.address, 7);
        assert_eq!(config.modem.radio.network_id, 18);
        assert_eq!(config.modem.radio.band, BandSetting::Region("EU".into()));
        assert_eq!(config.modem.timing.command_timeout, Duration::from_secs(2));
        assert_eq!(config.mesh.beacon_interval, Duration::from_secs(30));
        assert_eq!(config.mesh.key, "zen");
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            port: Some("/dev/ttyUSB3".into()),
            address: Some(9),
            band: Some("868.1".into()),
            key: Some("secret".into()),
            ..Default::default()
        };
        let config = NodeConfig::load(None, overrides).unwrap();
        assert_eq!(config.modem.link.port, PathBuf::from("/dev/ttyUSB3"));
        assert_eq!(config.modem.radio.address, 9);
        assert_eq!(config.modem.radio.band, BandSetting::Megahertz(868.1));
        assert_eq!(config.mesh.key, "secret");
    }

    #[test]
    fn test_empty_key_rejected() {
        let overrides = Overrides {
            key: Some(String::new()),
            ..Default::default()
        };
        assert!(NodeConfig::load(None, overrides).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = NodeConfig::from_file(Path::new("/nonexistent/loranet.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
