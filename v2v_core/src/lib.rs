//! V2V Core - Cooperative Awareness Coordinator
//!
//! Every vehicle in a traffic simulation periodically broadcasts a Basic
//! Safety Message, discovers the vehicles around it and evaluates collision
//! risk against them. This library implements that pipeline:
//! 1. **Messages**: closed, versioned safety records built from a kinematic snapshot
//! 2. **Scheduling**: a rate limiter that absorbs ticks faster than the broadcast rate
//! 3. **Discovery**: a symmetric, range-bounded neighbor relation (O(n²) or grid)
//! 4. **Threats**: constant-velocity Time-To-Collision mapped to discrete bands
//! 5. **Sharing**: cooperative perception triggered by proximity + risk
//!
//! The [`V2VCoordinator`] owns the network state and is its only writer;
//! consumers receive read-only views.

pub mod builder;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod messages;
pub mod rate_limiter;
pub mod registry;
pub mod sharing;
pub mod stats;
pub mod threat;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use builder::{build_message, BuildInputs, MotionSample, VehicleHandle};
pub use config::{CoordinatorConfig, PipelineStages};
pub use coordinator::{PublishedState, TickFailure, UpdateOutcome, V2VCoordinator};
pub use discovery::{discover, discover_with, Discovery, NeighborRecord, NeighborTable, SpatialIndex};
pub use error::{ConfigError, CoordinatorError};
pub use messages::{
    Acceleration, BrakeStatus, Dimensions, ExtendedData, PathPoint, SafetyMessage,
    TransmissionState, VehicleClass,
};
pub use rate_limiter::RateLimiter;
pub use registry::{Registry, RegistryEntry};
pub use sharing::{CooperativeShare, SharingPolicy};
pub use stats::NetworkStats;
pub use threat::{assess, ThreatLevel, ThreatRecord};

pub use v2v_env::{ActorId, VehicleId};
