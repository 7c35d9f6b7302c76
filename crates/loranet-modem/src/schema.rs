//! AT command table and parameter validation
//!
//! Every command the modem understands is described by a static
//! [`CommandSpec`]: which forms it accepts (bare, query, assignment) and a
//! contract per positional parameter. Validation is pure; it runs before a
//! command line is built and never touches the link.
//!
//! Wire format:
//! - `AT+<NAME>\r\n` (bare)
//! - `AT+<NAME>?\r\n` (query)
//! - `AT+<NAME>=<p1>,<p2>,...\r\n` (assignment)

use std::fmt;

use crate::error::{ModemError, Result};

/// Line terminator used in both directions
pub const LINE_TERMINATOR: &str = "\r\n";

/// Maximum payload carried by a single `send`
pub const MAX_PAYLOAD: usize = 240;

/// Broadcast / default target for `send`
pub const BROADCAST_ADDRESS: u16 = 0;

/// Region code to MHz table used for band resolution
pub const BAND_REGIONS: &[(&str, f64)] = &[("EU", 868.1), ("US", 915.0)];

/// Human-facing names mapped to wire names
pub const ALIASES: &[(&str, &str)] = &[
    ("baud", "ipr"),
    ("parameters", "parameter"),
    ("network", "networkid"),
    ("password", "cpin"),
    ("power", "crfop"),
    ("version", "ver"),
];

const BAUD_RATES: &[i64] = &[300, 1200, 4800, 9600, 19200, 28800, 38400, 57600, 115200];
const NETWORK_IDS: &[i64] = &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 18];
// Hz values of BAND_REGIONS
const BAND_FREQUENCIES: &[i64] = &[868_100_000, 915_000_000];

/// Which forms a command accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    /// Only `AT+NAME`
    Bare,
    /// Only `AT+NAME?`
    QueryOnly,
    /// `AT+NAME?` and `AT+NAME=...`
    Settable,
}

/// Character set requirement for string parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// `0-9a-fA-F` only
    HexDigits,
    /// 7-bit ASCII without line breaks
    Ascii,
}

impl TextEncoding {
    fn label(&self) -> &'static str {
        match self {
            TextEncoding::HexDigits => "hex",
            TextEncoding::Ascii => "ascii",
        }
    }

    fn accepts(&self, value: &str) -> bool {
        match self {
            TextEncoding::HexDigits => {
                !value.is_empty() && value.chars().all(|c| c.is_ascii_hexdigit())
            }
            TextEncoding::Ascii => value.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n'),
        }
    }
}

/// Contract for a single positional parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamContract {
    /// Inclusive numeric bounds
    Range {
        /// Lower bound
        min: i64,
        /// Upper bound
        max: i64,
    },
    /// Closed set of numbers
    OneOf(&'static [i64]),
    /// Closed set of words
    OneOfText(&'static [&'static str]),
    /// Length and encoding constrained string
    Text {
        /// Maximum length in characters
        max_len: usize,
        /// Character set
        encoding: TextEncoding,
    },
}

impl ParamContract {
    fn is_numeric(&self) -> bool {
        matches!(self, ParamContract::Range { .. } | ParamContract::OneOf(_))
    }

    /// Interpret a raw string the way this contract expects it
    pub fn interpret(&self, raw: &str) -> ParamValue {
        if self.is_numeric() {
            if let Ok(n) = raw.trim().parse::<i64>() {
                return ParamValue::Int(n);
            }
        }
        ParamValue::Text(raw.to_string())
    }

    /// Check a value against this contract
    pub fn check(&self, command: CommandName, value: &ParamValue) -> Result<()> {
        let command = command.wire_name().to_uppercase();
        match (self, value) {
            (ParamContract::Range { min, max }, ParamValue::Int(n)) => {
                if n < min || n > max {
                    return Err(ModemError::ParameterOutOfRange {
                        command,
                        value: n.to_string(),
                        min: *min,
                        max: *max,
                    });
                }
            }
            (ParamContract::Range { min, max }, ParamValue::Text(s)) => {
                return Err(ModemError::ParameterNotAllowed {
                    command,
                    value: s.clone(),
                    allowed: format!("{}..={}", min, max),
                });
            }
            (ParamContract::OneOf(allowed), value) => {
                let ok = matches!(value, ParamValue::Int(n) if allowed.contains(n));
                if !ok {
                    return Err(ModemError::ParameterNotAllowed {
                        command,
                        value: value.to_string(),
                        allowed: format!("{:?}", allowed),
                    });
                }
            }
            (ParamContract::OneOfText(allowed), value) => {
                let text = value.to_string();
                if !allowed.contains(&text.as_str()) {
                    return Err(ModemError::ParameterNotAllowed {
                        command,
                        value: text,
                        allowed: format!("{:?}", allowed),
                    });
                }
            }
            (ParamContract::Text { max_len, encoding }, value) => {
                let text = value.to_string();
                if text.chars().count() > *max_len {
                    return Err(ModemError::ParameterTooLong {
                        command,
                        value: text,
                        max: *max_len,
                    });
                }
                if !encoding.accepts(&text) {
                    return Err(ModemError::ParameterEncodingInvalid {
                        command,
                        value: text,
                        encoding: encoding.label(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A parameter value as written on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Decimal integer
    Int(i64),
    /// Free text
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Int(i64::from(v))
            }
        })*
    };
}

int_param!(u8, u16, u32, i8, i16, i32, i64);

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Static description of one command
#[derive(Debug)]
pub struct CommandSpec {
    /// Command identifier
    pub name: CommandName,
    /// Accepted forms
    pub shape: CommandShape,
    /// Positional parameter contracts
    pub params: &'static [ParamContract],
}

impl CommandSpec {
    /// Validate an assignment's parameters
    ///
    /// Fewer parameters than contracts is accepted (trailing optional
    /// parameters such as the `ipr` mode flag).
    pub fn validate(&self, params: &[ParamValue]) -> Result<()> {
        let wire = self.name.wire_name();
        match self.shape {
            CommandShape::Settable => {}
            _ => return Err(ModemError::AssignmentNotSupported(wire.to_string())),
        }
        if params.is_empty() {
            return Err(ModemError::MissingParameters(wire.to_string()));
        }
        if params.len() > self.params.len() {
            return Err(ModemError::ParameterCount {
                command: wire.to_uppercase(),
                max: self.params.len(),
                got: params.len(),
            });
        }
        for (contract, value) in self.params.iter().zip(params) {
            contract.check(self.name, value)?;
        }
        Ok(())
    }

    /// Split the text after `=` into typed parameters
    ///
    /// The last declared parameter swallows any remaining commas so that
    /// payloads survive a round trip.
    pub fn parse_params(&self, raw: &str) -> Vec<ParamValue> {
        let count = self.params.len().max(1);
        raw.splitn(count, ',')
            .zip(self.params.iter())
            .map(|(part, contract)| contract.interpret(part))
            .collect()
    }
}

static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: CommandName::Reset,
        shape: CommandShape::Bare,
        params: &[],
    },
    CommandSpec {
        name: CommandName::Mode,
        shape: CommandShape::Settable,
        params: &[ParamContract::OneOf(&[0, 1, 2])],
    },
    CommandSpec {
        name: CommandName::Ipr,
        shape: CommandShape::Settable,
        params: &[
            ParamContract::OneOf(BAUD_RATES),
            ParamContract::OneOfText(&["m"]),
        ],
    },
    CommandSpec {
        name: CommandName::Band,
        shape: CommandShape::Settable,
        params: &[ParamContract::OneOf(BAND_FREQUENCIES)],
    },
    CommandSpec {
        name: CommandName::Parameter,
        shape: CommandShape::Settable,
        params: &[
            ParamContract::Range { min: 5, max: 11 },
            ParamContract::Range { min: 7, max: 9 },
            ParamContract::Range { min: 1, max: 4 },
            ParamContract::OneOf(&[12]),
        ],
    },
    CommandSpec {
        name: CommandName::Address,
        shape: CommandShape::Settable,
        params: &[ParamContract::Range { min: 0, max: 65535 }],
    },
    CommandSpec {
        name: CommandName::NetworkId,
        shape: CommandShape::Settable,
        params: &[ParamContract::OneOf(NETWORK_IDS)],
    },
    CommandSpec {
        name: CommandName::Cpin,
        shape: CommandShape::Settable,
        params: &[ParamContract::Text {
            max_len: 8,
            encoding: TextEncoding::HexDigits,
        }],
    },
    CommandSpec {
        name: CommandName::Crfop,
        shape: CommandShape::Settable,
        params: &[ParamContract::Range { min: 0, max: 22 }],
    },
    CommandSpec {
        name: CommandName::Send,
        shape: CommandShape::Settable,
        params: &[
            ParamContract::Range { min: 0, max: 65535 },
            ParamContract::Range {
                min: 0,
                max: MAX_PAYLOAD as i64,
            },
            ParamContract::Text {
                max_len: MAX_PAYLOAD,
                encoding: TextEncoding::Ascii,
            },
        ],
    },
    CommandSpec {
        name: CommandName::Uid,
        shape: CommandShape::QueryOnly,
        params: &[],
    },
    CommandSpec {
        name: CommandName::Ver,
        shape: CommandShape::QueryOnly,
        params: &[],
    },
];

/// Commands in the modem's dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Software reset
    Reset,
    /// Work mode (transceiver / sleep)
    Mode,
    /// UART baud rate
    Ipr,
    /// RF frequency in Hz
    Band,
    /// Spreading factor, bandwidth, coding rate, preamble
    Parameter,
    /// Node address
    Address,
    /// Network id
    NetworkId,
    /// Network password
    Cpin,
    /// RF output power in dBm
    Crfop,
    /// Transmit a payload
    Send,
    /// Module unique id
    Uid,
    /// Firmware version
    Ver,
}

impl CommandName {
    /// Every command, in table order
    pub const ALL: [CommandName; 12] = [
        CommandName::Reset,
        CommandName::Mode,
        CommandName::Ipr,
        CommandName::Band,
        CommandName::Parameter,
        CommandName::Address,
        CommandName::NetworkId,
        CommandName::Cpin,
        CommandName::Crfop,
        CommandName::Send,
        CommandName::Uid,
        CommandName::Ver,
    ];

    /// Lowercase wire name
    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandName::Reset => "reset",
            CommandName::Mode => "mode",
            CommandName::Ipr => "ipr",
            CommandName::Band => "band",
            CommandName::Parameter => "parameter",
            CommandName::Address => "address",
            CommandName::NetworkId => "networkid",
            CommandName::Cpin => "cpin",
            CommandName::Crfop => "crfop",
            CommandName::Send => "send",
            CommandName::Uid => "uid",
            CommandName::Ver => "ver",
        }
    }

    /// Human-facing name (alias if one exists)
    pub fn display_name(&self) -> &'static str {
        let wire = self.wire_name();
        ALIASES
            .iter()
            .find(|(_, target)| *target == wire)
            .map(|(alias, _)| *alias)
            .unwrap_or(wire)
    }

    /// Resolve a human or wire name, case-insensitively
    pub fn resolve(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let wire = ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, target)| *target)
            .unwrap_or(lower.as_str());
        CommandName::ALL
            .into_iter()
            .find(|c| c.wire_name() == wire)
            .ok_or_else(|| ModemError::UnknownCommand(name.to_string()))
    }

    /// Contract table entry for this command
    pub fn spec(&self) -> &'static CommandSpec {
        // COMMANDS is declared in ALL order
        &COMMANDS[*self as usize]
    }

    /// Whether the status report should query this command
    pub fn is_reportable(&self) -> bool {
        self.spec().shape != CommandShape::Bare && *self != CommandName::Send
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Form of a built command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandForm {
    /// `AT+NAME`
    Bare,
    /// `AT+NAME?`
    Query,
    /// `AT+NAME=p1,p2`
    Assign(Vec<ParamValue>),
}

/// What the response body must look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Returned as-is
    Raw,
    /// Must start with `NAME=`, which is stripped
    Query,
    /// Must be exactly `OK`
    Ok,
}

/// A validated AT command ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    name: Option<CommandName>,
    form: CommandForm,
}

impl AtCommand {
    /// The bare `AT` liveness probe
    pub fn probe() -> Self {
        Self {
            name: None,
            form: CommandForm::Bare,
        }
    }

    /// A bare named command such as `AT+RESET`
    pub fn bare(name: CommandName) -> Result<Self> {
        if name.spec().shape != CommandShape::Bare {
            return Err(ModemError::MissingParameters(name.wire_name().to_string()));
        }
        Ok(Self {
            name: Some(name),
            form: CommandForm::Bare,
        })
    }

    /// A query such as `AT+ADDRESS?`
    pub fn query(name: CommandName) -> Result<Self> {
        if name.spec().shape == CommandShape::Bare {
            return Err(ModemError::QueryNotSupported(name.wire_name().to_string()));
        }
        Ok(Self {
            name: Some(name),
            form: CommandForm::Query,
        })
    }

    /// A validated assignment such as `AT+ADDRESS=2`
    pub fn assign(name: CommandName, params: Vec<ParamValue>) -> Result<Self> {
        name.spec().validate(&params)?;
        Ok(Self {
            name: Some(name),
            form: CommandForm::Assign(params),
        })
    }

    /// Build from a (possibly aliased) name, a query flag and parameters
    pub fn build(name: &str, is_query: bool, params: Vec<ParamValue>) -> Result<Self> {
        let name = CommandName::resolve(name)?;
        if is_query {
            return Self::query(name);
        }
        match name.spec().shape {
            CommandShape::Bare if params.is_empty() => Self::bare(name),
            _ => Self::assign(name, params),
        }
    }

    /// Parse a wire line back into a command
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.strip_suffix(LINE_TERMINATOR).unwrap_or(line);
        let rest = line
            .strip_prefix("AT")
            .ok_or_else(|| ModemError::UnknownCommand(line.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::probe());
        }
        let rest = rest
            .strip_prefix('+')
            .ok_or_else(|| ModemError::UnknownCommand(line.to_string()))?;

        if let Some(name) = rest.strip_suffix('?') {
            return Self::query(CommandName::resolve(name)?);
        }
        match rest.split_once('=') {
            Some((name, raw)) => {
                let name = CommandName::resolve(name)?;
                let params = name.spec().parse_params(raw);
                Self::assign(name, params)
            }
            None => Self::bare(CommandName::resolve(rest)?),
        }
    }

    /// Command name (None for the probe)
    pub fn name(&self) -> Option<CommandName> {
        self.name
    }

    /// Command form
    pub fn form(&self) -> &CommandForm {
        &self.form
    }

    /// Parameters of an assignment
    pub fn params(&self) -> &[ParamValue] {
        match &self.form {
            CommandForm::Assign(params) => params,
            _ => &[],
        }
    }

    /// Expected response shape
    pub fn reply(&self) -> Reply {
        match self.form {
            CommandForm::Bare => Reply::Raw,
            CommandForm::Query => Reply::Query,
            CommandForm::Assign(_) => Reply::Ok,
        }
    }

    /// Uppercase name as it appears on the wire
    pub fn wire_name(&self) -> Option<String> {
        self.name.map(|n| n.wire_name().to_uppercase())
    }

    /// Wire line without terminator
    pub fn text(&self) -> String {
        let mut line = String::from("AT");
        if let Some(name) = self.wire_name() {
            line.push('+');
            line.push_str(&name);
        }
        match &self.form {
            CommandForm::Bare => {}
            CommandForm::Query => line.push('?'),
            CommandForm::Assign(params) => {
                line.push('=');
                let joined: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                line.push_str(&joined.join(","));
            }
        }
        line
    }

    /// Wire line with terminator
    pub fn line(&self) -> String {
        format!("{}{}", self.text(), LINE_TERMINATOR)
    }

    /// Check a response body against the expected shape
    pub fn interpret_response(&self, response: String) -> Result<String> {
        match self.reply() {
            Reply::Raw => Ok(response),
            Reply::Query => {
                let name = self.wire_name().unwrap_or_default();
                let prefix = format!("{}=", name);
                match response.strip_prefix(&prefix) {
                    Some(value) => Ok(value.to_string()),
                    None => Err(ModemError::UnexpectedResponse {
                        command: name,
                        response,
                    }),
                }
            }
            Reply::Ok => {
                if response == "OK" {
                    Ok(response)
                } else {
                    Err(ModemError::CommandRejected {
                        command: self.text(),
                        response,
                    })
                }
            }
        }
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Resolve a region code to its frequency in MHz
pub fn region_megahertz(region: &str) -> Option<f64> {
    let upper = region.trim().to_ascii_uppercase();
    BAND_REGIONS
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, mhz)| *mhz)
}

/// Convert MHz to an integer frequency in Hz (truncating)
pub fn megahertz_to_hertz(mhz: f64) -> u64 {
    (mhz * 1_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for name in CommandName::ALL {
            assert_eq!(name.spec().name, name);
        }
    }

    #[test]
    fn test_band_table_matches_regions() {
        let derived: Vec<i64> = BAND_REGIONS
            .iter()
            .map(|(_, mhz)| megahertz_to_hertz(*mhz) as i64)
            .collect();
        assert_eq!(derived, BAND_FREQUENCIES);
    }

    #[test]
    fn test_alias_resolution() {
        assert_eq!(CommandName::resolve("baud").unwrap(), CommandName::Ipr);
        assert_eq!(CommandName::resolve("network").unwrap(), CommandName::NetworkId);
        assert_eq!(CommandName::resolve("password").unwrap(), CommandName::Cpin);
        assert_eq!(CommandName::resolve("power").unwrap(), CommandName::Crfop);
        assert_eq!(CommandName::resolve("version").unwrap(), CommandName::Ver);
        assert_eq!(CommandName::resolve("parameters").unwrap(), CommandName::Parameter);
        assert_eq!(CommandName::resolve("ADDRESS").unwrap(), CommandName::Address);
        assert!(matches!(
            CommandName::resolve("frobnicate"),
            Err(ModemError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CommandName::Ipr.display_name(), "baud");
        assert_eq!(CommandName::Ver.display_name(), "version");
        assert_eq!(CommandName::Address.display_name(), "address");
    }

    #[test]
    fn test_build_lines() {
        assert_eq!(AtCommand::probe().line(), "AT\r\n");
        assert_eq!(
            AtCommand::bare(CommandName::Reset).unwrap().line(),
            "AT+RESET\r\n"
        );
        assert_eq!(
            AtCommand::build("version", true, vec![]).unwrap().line(),
            "AT+VER?\r\n"
        );
        let send = AtCommand::build("send", false, vec![5u16.into(), 4usize.into(), "ping".into()])
            .unwrap();
        assert_eq!(send.line(), "AT+SEND=5,4,ping\r\n");
    }

    #[test]
    fn test_range_violation() {
        let err = AtCommand::assign(CommandName::Crfop, vec![23u8.into()]).unwrap_err();
        assert!(matches!(err, ModemError::ParameterOutOfRange { max: 22, .. }));
    }

    #[test]
    fn test_enumeration_violation() {
        let err = AtCommand::assign(CommandName::NetworkId, vec![16u8.into()]).unwrap_err();
        assert!(matches!(err, ModemError::ParameterNotAllowed { .. }));
        let err = AtCommand::assign(CommandName::Ipr, vec![115200u32.into(), "x".into()])
            .unwrap_err();
        assert!(matches!(err, ModemError::ParameterNotAllowed { .. }));
        assert!(AtCommand::assign(CommandName::Ipr, vec![9600u32.into(), "m".into()]).is_ok());
        assert!(AtCommand::assign(CommandName::Ipr, vec![9600u32.into()]).is_ok());
    }

    #[test]
    fn test_text_violations() {
        let err = AtCommand::assign(CommandName::Cpin, vec!["123456789".into()]).unwrap_err();
        assert!(matches!(err, ModemError::ParameterTooLong { max: 8, .. }));
        let err = AtCommand::assign(CommandName::Cpin, vec!["1234abcz".into()]).unwrap_err();
        assert!(matches!(err, ModemError::ParameterEncodingInvalid { .. }));
        let err = AtCommand::assign(
            CommandName::Send,
            vec![0u16.into(), 2usize.into(), "hé".into()],
        )
        .unwrap_err();
        assert!(matches!(err, ModemError::ParameterEncodingInvalid { .. }));
        let long = "x".repeat(MAX_PAYLOAD + 1);
        let err = AtCommand::assign(CommandName::Send, vec![0u16.into(), 1usize.into(), long.into()])
            .unwrap_err();
        assert!(matches!(err, ModemError::ParameterTooLong { .. }));
    }

    #[test]
    fn test_form_errors() {
        assert!(matches!(
            AtCommand::build("address", false, vec![]),
            Err(ModemError::MissingParameters(_))
        ));
        assert!(matches!(
            AtCommand::build("uid", false, vec![1u8.into()]),
            Err(ModemError::AssignmentNotSupported(_))
        ));
        assert!(matches!(
            AtCommand::build("reset", true, vec![]),
            Err(ModemError::QueryNotSupported(_))
        ));
        assert!(matches!(
            AtCommand::build("address", false, vec![1u8.into(), 2u8.into()]),
            Err(ModemError::ParameterCount { max: 1, got: 2, .. })
        ));
    }

    #[test]
    fn test_wire_round_trip() {
        let cases = vec![
            AtCommand::probe(),
            AtCommand::bare(CommandName::Reset).unwrap(),
            AtCommand::query(CommandName::Uid).unwrap(),
            AtCommand::assign(CommandName::Address, vec![65535u16.into()]).unwrap(),
            AtCommand::assign(
                CommandName::Parameter,
                vec![9u8.into(), 7u8.into(), 1u8.into(), 12u8.into()],
            )
            .unwrap(),
            AtCommand::assign(CommandName::Cpin, vec!["00ABcd12".into()]).unwrap(),
            AtCommand::assign(
                CommandName::Send,
                vec![7u16.into(), 9usize.into(), "a,b,c,d,e".into()],
            )
            .unwrap(),
        ];
        for command in cases {
            let parsed = AtCommand::parse(&command.line()).unwrap();
            assert_eq!(parsed, command, "round trip of {}", command);
        }
    }

    #[test]
    fn test_interpret_response() {
        let query = AtCommand::query(CommandName::Address).unwrap();
        assert_eq!(query.interpret_response("ADDRESS=2".into()).unwrap(), "2");
        assert!(matches!(
            query.interpret_response("NETWORKID=18".into()),
            Err(ModemError::UnexpectedResponse { .. })
        ));

        let assign = AtCommand::assign(CommandName::Address, vec![2u16.into()]).unwrap();
        assert_eq!(assign.interpret_response("OK".into()).unwrap(), "OK");
        assert!(matches!(
            assign.interpret_response("ERR=4".into()),
            Err(ModemError::CommandRejected { .. })
        ));

        assert_eq!(
            AtCommand::probe().interpret_response("OK".into()).unwrap(),
            "OK"
        );
    }

    #[test]
    fn test_band_conversion() {
        assert_eq!(region_megahertz("us"), Some(915.0));
        assert_eq!(megahertz_to_hertz(region_megahertz("US").unwrap()), 915_000_000);
        assert_eq!(megahertz_to_hertz(868.1), 868_100_000);
        assert_eq!(region_megahertz("XX"), None);
    }
}
