//! Error types for the V2V environment abstraction.

use crate::types::ActorId;
use thiserror::Error;

/// Errors raised while reading the external simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// The snapshot has no entry for the requested actor (destroyed, not yet spawned)
    #[error("Actor {0} not found in snapshot")]
    ActorNotFound(ActorId),

    /// The snapshot exists but cannot be used (e.g. torn read from the simulator)
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl EnvError {
    /// Creates an invalid-snapshot error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }
}
