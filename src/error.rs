//! Simulation error types

use thiserror::Error;

/// Errors surfaced by the simulation library
#[derive(Debug, Error)]
pub enum SimError {
    /// Topology or configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No router with this identity exists in the network
    #[error("Unknown router: {0}")]
    UnknownRouter(String),

    /// Updates kept changing tables after the round limit
    #[error("Network did not converge within {rounds} rounds")]
    NotConverged { rounds: usize },

    /// Config file could not be parsed or serialized
    #[error("Config format error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A router task of the concurrent runtime is no longer running
    #[error("Router task closed")]
    RuntimeClosed,
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
