//! Error types for the V2V coordinator.

use thiserror::Error;
use v2v_env::{EnvError, VehicleId};

/// Invalid coordinator configuration. Fatal at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Update rate must be a positive finite number of Hz, got {0}")]
    InvalidRate(f64),

    #[error("Communication range must be a positive finite number of meters, got {0}")]
    InvalidRange(f64),

    #[error("Cooperative sharing distance must be non-negative and finite, got {0}")]
    InvalidSharingDistance(f64),

    #[error("Grid threshold must be at least 2 participants, got {0}")]
    InvalidGridThreshold(usize),

    #[error("Cooperative sharing requires the threat assessment stage")]
    SharingWithoutThreats,

    #[error("Invalid configuration document: {0}")]
    Parse(String),
}

/// Errors surfaced synchronously by the coordinator.
///
/// Per-vehicle problems during a tick are never returned from `update()`;
/// they are recorded as tick failures instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Vehicle {0} is already registered")]
    DuplicateId(VehicleId),

    #[error("Snapshot lookup failed for vehicle {vehicle_id}: {source}")]
    Snapshot {
        vehicle_id: VehicleId,
        #[source]
        source: EnvError,
    },
}
