//! Error types for trill-osc

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trill-osc error types
///
/// Everything except [`Error::Config`] at startup and a failed bind of the
/// local UDP endpoint is recoverable: the control loop logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus or network transfer failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or unsupported control message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No device registered under this id
    #[error("Unknown device id: {0}")]
    NotFound(String),

    /// A device with this id already exists
    #[error("Duplicate device id: {0}")]
    Duplicate(String),

    /// Invalid configuration, device name, mode name or address
    #[error("Configuration error: {0}")]
    Config(String),

    /// No device answered at the given address
    #[error("No device answered on bus {bus} at address {address:#04x}")]
    OpenFailed {
        /// Bus number
        bus: u8,
        /// 7-bit device address
        address: u8,
    },

    /// Everything else (signal handler setup, ...)
    #[error("{0}")]
    Other(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<rosc::OscError> for Error {
    fn from(e: rosc::OscError) -> Self {
        Error::Protocol(format!("OSC: {:?}", e))
    }
}
