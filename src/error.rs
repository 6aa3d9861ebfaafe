use thiserror::Error;

/// Result alias used throughout the controller.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the session controller and its registries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("invalid handle")]
    InvalidHandle,

    #[error("session not found")]
    SessionNotFound,

    /// Configuration could not be read or failed validation.
    #[error("{0:#}")]
    Config(anyhow::Error),

    /// The engine rejected the start request; message comes from the engine.
    #[error("{0:#}")]
    EngineStart(anyhow::Error),

    /// The engine failed to shut down; the handle stays usable for a retry.
    #[error("{0:#}")]
    EngineStop(anyhow::Error),

    #[error("{0}")]
    InvalidArgument(String),
}
