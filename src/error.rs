//! Error types for RF60x-IO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// RF60x-IO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint could not be opened, or was lost and cannot be recovered
    #[error("Connection error: {0}")]
    Connection(String),

    /// Sensor address outside 0..=127
    #[error("Invalid sensor address: {0} (must be 0..=127)")]
    InvalidAddress(u8),

    /// Command code outside 0..=15
    #[error("Invalid command code: {0:#04x} (must be 0..=15)")]
    InvalidCode(u8),

    /// Bad configuration or routing table
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the underlying endpoint is gone and retrying is pointless.
    ///
    /// Transient faults (timeouts, interrupted reads) return false; the
    /// bridge and session loops retry those with backoff instead of
    /// terminating.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Serial(e) => e.kind == serialport::ErrorKind::NoDevice,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Connection(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        let gone = Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert!(gone.is_disconnect());

        let transient = Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        assert!(!transient.is_disconnect());

        assert!(!Error::InvalidAddress(200).is_disconnect());
        assert!(Error::Connection("lost".into()).is_disconnect());
    }
}
