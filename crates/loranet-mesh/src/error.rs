//! Error types for peer discovery

use loranet_modem::ModemError;
use thiserror::Error;

/// Errors raised by the mesh layer
#[derive(Error, Debug)]
pub enum MeshError {
    /// Modem failure
    #[error("Modem error: {0}")]
    Modem(#[from] ModemError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MeshError {
    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            MeshError::Modem(e) => e.error_code(),
            MeshError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

/// Result type alias for mesh operations
pub type Result<T> = std::result::Result<T, MeshError>;
