//! Harness errors.

use thiserror::Error;
use v2v_core::{ConfigError, CoordinatorError};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Sensor noise must be a finite, non-negative standard deviation, got {0}")]
    InvalidNoise(f64),

    #[error("Tick rate must be positive, got {0} Hz")]
    InvalidTickRate(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
