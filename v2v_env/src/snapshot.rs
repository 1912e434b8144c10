//! Point-in-time kinematic snapshots consumed from the external simulation.

use crate::error::EnvError;
use crate::types::ActorId;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Driver inputs applied to a vehicle during the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleControl {
    /// Throttle pedal [0.0 - 1.0]
    pub throttle: f64,

    /// Steering input [-1.0 - 1.0]
    pub steer: f64,

    /// Brake pedal [0.0 - 1.0]
    pub brake: f64,

    /// Hand brake engaged
    pub hand_brake: bool,

    /// Reverse gear selected
    pub reverse: bool,
}

/// State of one actor, valid exactly at the snapshot's tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Simulator actor this entry belongs to
    pub actor_id: ActorId,

    /// Location [x, y, z] in meters (shared world frame)
    pub location: Vector3<f64>,

    /// Yaw in degrees, any range (normalized by the message builder)
    pub yaw_deg: f64,

    /// Velocity [vx, vy, vz] in m/s
    pub velocity: Vector3<f64>,

    /// World-frame acceleration in m/s², if the simulator reports it
    pub acceleration: Option<Vector3<f64>>,

    /// Driver inputs
    pub control: VehicleControl,

    /// Exterior light states (e.g. "low_beam" -> "on")
    #[serde(default)]
    pub lights: BTreeMap<String, String>,

    /// Wiper states (e.g. "front" -> "intermittent")
    #[serde(default)]
    pub wipers: BTreeMap<String, String>,
}

impl ActorSnapshot {
    /// Creates a snapshot entry with neutral controls and no auxiliary state.
    pub fn new(actor_id: ActorId, location: Vector3<f64>, velocity: Vector3<f64>, yaw_deg: f64) -> Self {
        Self {
            actor_id,
            location,
            yaw_deg,
            velocity,
            acceleration: None,
            control: VehicleControl::default(),
            lights: BTreeMap::new(),
            wipers: BTreeMap::new(),
        }
    }

    /// Magnitude of the velocity vector (m/s).
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }
}

/// A per-tick view of the simulated world.
///
/// Must be taken immediately after the simulation tick advances; the
/// coordinator cannot detect a stale snapshot and will broadcast stale
/// kinematics if handed one.
pub trait WorldSnapshot {
    /// Simulation-relative time of this snapshot in seconds.
    fn timestamp(&self) -> f64;

    /// Looks up one actor.
    ///
    /// # Returns
    /// * `Ok(&ActorSnapshot)` - the actor exists at this tick
    /// * `Err(EnvError::ActorNotFound)` - the actor is gone (or not yet spawned)
    fn find(&self, actor_id: ActorId) -> Result<&ActorSnapshot, EnvError>;
}

/// Map-backed snapshot, the common in-memory representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Simulation time (seconds)
    pub timestamp: f64,

    /// Actor states keyed by simulator id
    pub actors: HashMap<ActorId, ActorSnapshot>,
}

impl FrameSnapshot {
    /// Creates an empty snapshot at the given time.
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            actors: HashMap::new(),
        }
    }

    /// Inserts (or replaces) an actor entry.
    pub fn insert(&mut self, actor: ActorSnapshot) {
        self.actors.insert(actor.actor_id, actor);
    }

    /// Builder-style variant of [`FrameSnapshot::insert`].
    pub fn with_actor(mut self, actor: ActorSnapshot) -> Self {
        self.insert(actor);
        self
    }
}

impl WorldSnapshot for FrameSnapshot {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn find(&self, actor_id: ActorId) -> Result<&ActorSnapshot, EnvError> {
        self.actors.get(&actor_id).ok_or(EnvError::ActorNotFound(actor_id))
    }
}
