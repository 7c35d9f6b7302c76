//! Typed radio settings
//!
//! Most settings map one-to-one onto an assignment. Band and modulation need
//! pre-processing first (band conversion to Hz, the spreading factor /
//! bandwidth cross-check), which lives here rather than in the generic path.

use crate::config::{BandSetting, ModemConfig, Modulation};
use crate::error::Result;
use crate::schema::{AtCommand, CommandName, ParamValue};

/// A single reconfigurable parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// Node address
    Address(u16),
    /// Network id
    NetworkId(u8),
    /// Network password
    Password(String),
    /// Frequency band
    Band(BandSetting),
    /// Modulation parameters
    Modulation(Modulation),
    /// RF output power in dBm
    Power(u8),
    /// Work mode
    Mode(u8),
    /// UART baud rate
    Baud(u32),
}

impl Setting {
    /// Command this setting is written with
    pub fn command_name(&self) -> CommandName {
        match self {
            Setting::Address(_) => CommandName::Address,
            Setting::NetworkId(_) => CommandName::NetworkId,
            Setting::Password(_) => CommandName::Cpin,
            Setting::Band(_) => CommandName::Band,
            Setting::Modulation(_) => CommandName::Parameter,
            Setting::Power(_) => CommandName::Crfop,
            Setting::Mode(_) => CommandName::Mode,
            Setting::Baud(_) => CommandName::Ipr,
        }
    }

    /// Build the validated assignment for this setting
    pub fn to_command(&self) -> Result<AtCommand> {
        let params: Vec<ParamValue> = match self {
            Setting::Address(address) => vec![(*address).into()],
            Setting::NetworkId(id) => vec![(*id).into()],
            Setting::Password(password) => vec![password.as_str().into()],
            Setting::Band(band) => vec![ParamValue::Int(band.to_hertz()? as i64)],
            Setting::Modulation(m) => {
                m.check_compatible()?;
                vec![
                    m.spreading_factor.into(),
                    m.bandwidth.into(),
                    m.coding_rate.into(),
                    m.preamble_length.into(),
                ]
            }
            Setting::Power(power) => vec![(*power).into()],
            Setting::Mode(mode) => vec![(*mode).into()],
            Setting::Baud(baud) => vec![(*baud).into()],
        };
        AtCommand::assign(self.command_name(), params)
    }

    /// Record an accepted setting in the stored configuration
    pub fn store(&self, config: &mut ModemConfig) {
        match self {
            Setting::Address(address) => config.address = *address,
            Setting::NetworkId(id) => config.network_id = *id,
            Setting::Password(password) => config.password = Some(password.clone()),
            Setting::Band(band) => config.band = band.clone(),
            Setting::Modulation(m) => config.modulation = *m,
            Setting::Power(power) => config.power = Some(*power),
            Setting::Mode(_) | Setting::Baud(_) => {}
        }
    }

    /// Provisioning sequence for a configuration, in write order
    pub fn provisioning(config: &ModemConfig) -> Vec<Setting> {
        let mut settings = vec![
            Setting::Address(config.address),
            Setting::NetworkId(config.network_id),
        ];
        if let Some(password) = &config.password {
            settings.push(Setting::Password(password.clone()));
        }
        settings.push(Setting::Band(config.band.clone()));
        settings.push(Setting::Modulation(config.modulation));
        if let Some(power) = config.power {
            settings.push(Setting::Power(power));
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModemError;

    #[test]
    fn test_band_conversion() {
        let cmd = Setting::Band(BandSetting::Region("US".into()))
            .to_command()
            .unwrap();
        assert_eq!(cmd.text(), "AT+BAND=915000000");

        let cmd = Setting::Band(BandSetting::Megahertz(868.1))
            .to_command()
            .unwrap();
        assert_eq!(cmd.text(), "AT+BAND=868100000");
    }

    #[test]
    fn test_band_not_in_table() {
        let err = Setting::Band(BandSetting::Hertz(433_000_000))
            .to_command()
            .unwrap_err();
        assert!(matches!(err, ModemError::ParameterNotAllowed { .. }));
    }

    #[test]
    fn test_modulation_cross_check() {
        let err = Setting::Modulation(Modulation {
            spreading_factor: 11,
            bandwidth: 7,
            coding_rate: 1,
            preamble_length: 12,
        })
        .to_command()
        .unwrap_err();
        assert!(matches!(err, ModemError::IncompatibleModulation { .. }));

        let cmd = Setting::Modulation(Modulation::default())
            .to_command()
            .unwrap();
        assert_eq!(cmd.text(), "AT+PARAMETER=11,9,1,12");
    }

    #[test]
    fn test_password_validation() {
        assert!(Setting::Password("1234ABCD".into()).to_command().is_ok());
        assert!(matches!(
            Setting::Password("12345678A".into()).to_command(),
            Err(ModemError::ParameterTooLong { .. })
        ));
        assert!(matches!(
            Setting::Password("zen".into()).to_command(),
            Err(ModemError::ParameterEncodingInvalid { .. })
        ));
    }

    #[test]
    fn test_provisioning_order() {
        let mut config = ModemConfig::default();
        let names: Vec<_> = Setting::provisioning(&config)
            .iter()
            .map(|s| s.command_name())
            .collect();
        assert_eq!(
            names,
            vec![
                CommandName::Address,
                CommandName::NetworkId,
                CommandName::Band,
                CommandName::Parameter
            ]
        );

        config.password = Some("00ff00ff".into());
        config.power = Some(14);
        let names: Vec<_> = Setting::provisioning(&config)
            .iter()
            .map(|s| s.command_name())
            .collect();
        assert_eq!(names[2], CommandName::Cpin);
        assert_eq!(names.last(), Some(&CommandName::Crfop));
    }

    #[test]
    fn test_store() {
        let mut config = ModemConfig::default();
        Setting::Address(9).store(&mut config);
        Setting::Power(10).store(&mut config);
        assert_eq!(config.address, 9);
        assert_eq!(config.power, Some(10));
    }
}
