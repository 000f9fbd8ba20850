//! Error types

use thiserror::Error;

/// Errors raised while talking to the serial link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Failed to snapshot line settings: {0}")]
    Snapshot(String),

    #[error("Failed to restore line settings: {0}")]
    Restore(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for LinkError {
    fn from(e: serialport::Error) -> Self {
        LinkError::SerialError(e.to_string())
    }
}

/// Invalid detection settings or candidate lists
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Candidate table must contain at least one rate")]
    EmptyTable,

    #[error("Invalid baud rate: {0}")]
    InvalidRate(String),

    #[error("Wait period must be at least one millisecond")]
    ZeroWaitPeriod,

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors while emitting the configuration report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to launch {bin}: {source}")]
    Launch {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Fatal errors of a detection session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to start the serial reader: {0}")]
    ReaderSpawn(#[source] std::io::Error),

    #[error(transparent)]
    Link(#[from] LinkError),
}
