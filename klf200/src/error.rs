use thiserror::Error;

/// Errors reported by the gateway client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid gateway address '{0}'")]
    Address(String),

    #[error("Invalid frame: {0}")]
    Frame(String),

    #[error("Gateway rejected {0}")]
    Rejected(&'static str),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Connection to the gateway is closed")]
    ConnectionClosed,
}

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
