use thiserror::Error;

/// Errors surfaced by the node's collaborators.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Reading or writing the config document failed
    #[error("config storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config could not be encoded
    #[error("config encode error: {0}")]
    Encode(#[from] ron::Error),

    /// The stored config document is not valid RON for `MeshConfig`
    #[error("config decode error: {0}")]
    Decode(#[from] ron::error::SpannedError),

    /// A radio feed line was not a valid report
    #[error("radio feed decode error: {0}")]
    Feed(#[from] serde_json::Error),

    /// GPIO access failed
    #[cfg(feature = "pi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// Configuration values that cannot be acted on
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
