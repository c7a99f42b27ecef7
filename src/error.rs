//! Error types for the MR-Box driver

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Driver error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No peripheral board found during discovery
    #[error("No peripheral board available for connection")]
    NoDeviceFound,

    /// Connection is down, or went down while waiting
    #[error("Not connected")]
    Disconnected,

    /// No response within the deadline
    #[error("Request timeout")]
    Timeout,

    /// Peer speaks a different protocol revision
    #[error("Protocol version mismatch: expected {expected:#04x}, got {actual:#04x}")]
    VersionMismatch {
        /// Version this build was compiled against
        expected: u8,
        /// Version reported by the device
        actual: u8,
    },

    /// Input rejected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed or unexpected response payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration file parse error
    #[error("Configuration error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file write error
    #[error("Configuration error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
