//! Error types for modem operations
//!
//! This module provides error handling for every layer of the modem driver:
//! frame parsing, parameter validation, the command round trip and the
//! reset/provisioning lifecycle.

use thiserror::Error;

use crate::lifecycle::ModemState;

/// Main error type for modem operations
#[derive(Error, Debug)]
pub enum ModemError {
    // ===== Link Errors =====
    /// Serial port not found
    #[error("Serial port not found: {0}")]
    PortNotFound(String),

    /// Serial port open failed
    #[error("Failed to open serial port {port}: {reason}")]
    PortOpenFailed {
        /// Port path
        port: String,
        /// Failure reason
        reason: String,
    },

    /// Serial write error
    #[error("Serial write error: {0}")]
    WriteError(String),

    /// The link reached end of stream
    #[error("Serial link disconnected")]
    Disconnected,

    /// A line did not follow the `+...\r\n` framing
    #[error("Malformed frame: {0:?}")]
    MalformedFrame(String),

    // ===== Validation Errors =====
    /// Command name is not in the command table
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Numeric parameter outside its inclusive bounds
    #[error("[{command}] Value out of range: {value} (allowed {min}..={max})")]
    ParameterOutOfRange {
        /// Wire command name
        command: String,
        /// Offending value
        value: String,
        /// Lower bound
        min: i64,
        /// Upper bound
        max: i64,
    },

    /// Parameter not part of the command's accepted set
    #[error("[{command}] Value '{value}' not in: {allowed}")]
    ParameterNotAllowed {
        /// Wire command name
        command: String,
        /// Offending value
        value: String,
        /// Human readable list of accepted values
        allowed: String,
    },

    /// String parameter longer than allowed
    #[error("[{command}] Value '{value}' exceeds max length: {max}")]
    ParameterTooLong {
        /// Wire command name
        command: String,
        /// Offending value
        value: String,
        /// Maximum length in characters
        max: usize,
    },

    /// String parameter with the wrong character set
    #[error("[{command}] Value is not a {encoding} string: {value}")]
    ParameterEncodingInvalid {
        /// Wire command name
        command: String,
        /// Offending value
        value: String,
        /// Expected encoding
        encoding: &'static str,
    },

    /// More parameters than the command accepts
    #[error("[{command}] Too many parameters: got {got}, accepts {max}")]
    ParameterCount {
        /// Wire command name
        command: String,
        /// Number of declared parameters
        max: usize,
        /// Number supplied
        got: usize,
    },

    /// Assignment issued without parameters
    #[error("Command missing parameters: {0}")]
    MissingParameters(String),

    /// Query issued for a command that cannot be queried
    #[error("Command cannot be queried: {0}")]
    QueryNotSupported(String),

    /// Assignment issued for a query-only or bare command
    #[error("Command does not take parameters: {0}")]
    AssignmentNotSupported(String),

    /// Region code missing from the band table
    #[error("Unknown band region: {0}")]
    UnknownBand(String),

    /// Spreading factor too large for the chosen bandwidth
    #[error("Invalid spreading factor '{spreading_factor}' for bandwidth: {bandwidth}")]
    IncompatibleModulation {
        /// Requested spreading factor
        spreading_factor: u8,
        /// Requested bandwidth index
        bandwidth: u8,
    },

    // ===== Command Errors =====
    /// No response arrived before the command timeout
    #[error("Got no response to {command} after {timeout_ms}ms")]
    CommandTimeout {
        /// Wire line without terminator
        command: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// A query response did not echo the command name
    #[error("Invalid response to {command}: {response}")]
    UnexpectedResponse {
        /// Wire command name
        command: String,
        /// Response body
        response: String,
    },

    /// An assertion was answered with something other than `OK`
    #[error("[{command}] Error: {response}")]
    CommandRejected {
        /// Wire line without terminator
        command: String,
        /// Response body
        response: String,
    },

    // ===== Lifecycle Errors =====
    /// No status frame arrived after a reset
    #[error("Module not responding after reset")]
    ModuleNotResponding,

    /// The post-reset status frame was not `READY`
    #[error("Module not ready after reset: {0}")]
    ModuleNotReady(String),

    /// The bare `AT` probe failed
    #[error("Module is not responding to AT commands: {0}")]
    ModuleUnresponsive(String),

    /// Version or uid query came back empty
    #[error("Unknown module")]
    UnknownModule,

    /// Operation requires a provisioned modem
    #[error("Modem not ready (state: {0})")]
    NotReady(ModemState),

    /// Recovery gave up after repeated failures
    #[error("Modem recovery failed after {attempts} attempts: {last}")]
    RecoveryFailed {
        /// Number of attempts made
        attempts: u32,
        /// Last failure
        last: Box<ModemError>,
    },

    // ===== General Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModemError {
    /// Check if this error was raised before anything touched the link
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ModemError::UnknownCommand(_)
                | ModemError::ParameterOutOfRange { .. }
                | ModemError::ParameterNotAllowed { .. }
                | ModemError::ParameterTooLong { .. }
                | ModemError::ParameterEncodingInvalid { .. }
                | ModemError::ParameterCount { .. }
                | ModemError::MissingParameters(_)
                | ModemError::QueryNotSupported(_)
                | ModemError::AssignmentNotSupported(_)
                | ModemError::UnknownBand(_)
                | ModemError::IncompatibleModulation { .. }
        )
    }

    /// Check if this error is recoverable/retriable
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ModemError::CommandTimeout { .. }
                | ModemError::MalformedFrame(_)
                | ModemError::NotReady(_)
                | ModemError::WriteError(_)
        )
    }

    /// Check if this is a command timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ModemError::CommandTimeout { .. })
    }

    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            ModemError::PortNotFound(_) => "PORT_NOT_FOUND",
            ModemError::PortOpenFailed { .. } => "PORT_OPEN_FAILED",
            ModemError::WriteError(_) => "WRITE_ERROR",
            ModemError::Disconnected => "DISCONNECTED",
            ModemError::MalformedFrame(_) => "MALFORMED_FRAME",
            ModemError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            ModemError::ParameterOutOfRange { .. } => "PARAMETER_OUT_OF_RANGE",
            ModemError::ParameterNotAllowed { .. } => "PARAMETER_NOT_ALLOWED",
            ModemError::ParameterTooLong { .. } => "PARAMETER_TOO_LONG",
            ModemError::ParameterEncodingInvalid { .. } => "PARAMETER_ENCODING_INVALID",
            ModemError::ParameterCount { .. } => "PARAMETER_COUNT",
            ModemError::MissingParameters(_) => "MISSING_PARAMETERS",
            ModemError::QueryNotSupported(_) => "QUERY_NOT_SUPPORTED",
            ModemError::AssignmentNotSupported(_) => "ASSIGNMENT_NOT_SUPPORTED",
            ModemError::UnknownBand(_) => "UNKNOWN_BAND",
            ModemError::IncompatibleModulation { .. } => "INCOMPATIBLE_MODULATION",
            ModemError::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            ModemError::UnexpectedResponse { .. } => "UNEXPECTED_RESPONSE",
            ModemError::CommandRejected { .. } => "COMMAND_REJECTED",
            ModemError::ModuleNotResponding => "MODULE_NOT_RESPONDING",
            ModemError::ModuleNotReady(_) => "MODULE_NOT_READY",
            ModemError::ModuleUnresponsive(_) => "MODULE_UNRESPONSIVE",
            ModemError::UnknownModule => "UNKNOWN_MODULE",
            ModemError::NotReady(_) => "NOT_READY",
            ModemError::RecoveryFailed { .. } => "RECOVERY_FAILED",
            ModemError::InvalidConfig(_) => "INVALID_CONFIG",
            ModemError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias for modem operations
pub type Result<T> = std::result::Result<T, ModemError>;

// Conversion from serialport error (only when serial feature is enabled)
#[cfg(feature = "serial")]
impl From<serialport::Error> for ModemError {
    fn from(err: serialport::Error) -> Self {
        match err.kind {
            serialport::ErrorKind::NoDevice => ModemError::PortNotFound(err.description),
            serialport::ErrorKind::Io(kind) => {
                ModemError::Io(std::io::Error::new(kind, err.description))
            }
            _ => ModemError::PortOpenFailed {
                port: String::new(),
                reason: err.description,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ModemError::UnknownCommand("foo".to_string());
        assert_eq!(err.error_code(), "UNKNOWN_COMMAND");
        assert_eq!(ModemError::UnknownModule.error_code(), "UNKNOWN_MODULE");
    }

    #[test]
    fn test_validation_errors() {
        assert!(ModemError::IncompatibleModulation {
            spreading_factor: 11,
            bandwidth: 7
        }
        .is_validation_error());
        assert!(ModemError::UnknownBand("XX".to_string()).is_validation_error());
        assert!(!ModemError::CommandTimeout {
            command: "AT+VER?".to_string(),
            timeout_ms: 5000
        }
        .is_validation_error());
    }

    #[test]
    fn test_is_retriable() {
        assert!(ModemError::CommandTimeout {
            command: "AT".to_string(),
            timeout_ms: 10
        }
        .is_retriable());
        assert!(!ModemError::UnknownModule.is_retriable());
    }

    #[test]
    fn test_rejected_display() {
        let err = ModemError::CommandRejected {
            command: "AT+ADDRESS=2".to_string(),
            response: "ERR=4".to_string(),
        };
        assert_eq!(err.to_string(), "[AT+ADDRESS=2] Error: ERR=4");
    }
}
