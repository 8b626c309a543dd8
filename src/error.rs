//! Simulation error types.
//!
//! Errors split along fatality lines: configuration and topology errors
//! abort a run before any agent starts, provisioning and channel errors are
//! scoped to a single agent, and malformed wire input is not an error at
//! all (the listen loop discards it).

use thiserror::Error;

/// DenIM simulation errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration error (bad file, bad value, infeasible population).
    #[error("Config error: {0}")]
    Config(String),

    /// Contact topology could not be generated under the given constraints.
    #[error("Topology error: {0}")]
    Topology(String),

    /// A client process could not be provisioned.
    #[error("Provision error: {0}")]
    Provision(String),

    /// Process channel I/O failed after the reconnect attempt.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Operation on a channel that has already been closed.
    #[error("Channel closed")]
    ChannelClosed,

    /// Packet capture collaborator failed to start.
    #[error("Capture error: {0}")]
    Capture(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        SimError::Config(err.to_string())
    }
}
