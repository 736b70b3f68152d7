//! Error types for sub-volume iteration

use thiserror::Error;

/// Main error type for iteration operations
#[derive(Error, Debug)]
pub enum SubVolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No more sub-volumes: iteration is exhausted")]
    Exhausted,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Read from volume '{volume}' failed: {message}")]
    VolumeRead { volume: String, message: String },

    #[error("Iteration cancelled")]
    Cancelled,

    #[error("Background reader terminated: {0}")]
    ReaderTerminated(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SubVolumeError {
    /// Build a read failure for the named volume
    pub fn volume_read(volume: impl Into<String>, message: impl Into<String>) -> Self {
        SubVolumeError::VolumeRead {
            volume: volume.into(),
            message: message.into(),
        }
    }
}

/// Specialized Result type for iteration operations
pub type Result<T> = std::result::Result<T, SubVolumeError>;

impl From<serde_json::Error> for SubVolumeError {
    fn from(err: serde_json::Error) -> Self {
        SubVolumeError::Serialization(err.to_string())
    }
}
