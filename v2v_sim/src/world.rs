//! SimWorld - The simulation harness container.
//!
//! Owns the virtual clock, the ground truth oracle and a coordinator driven
//! by that clock. One [`SimWorld::tick`] is one simulation step: time and
//! physics advance first, then the coordinator sees a fresh snapshot.

use crate::context::SimContext;
use crate::error::SimError;
use crate::oracle::Oracle;

use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use v2v_core::{CoordinatorConfig, UpdateOutcome, V2VCoordinator, VehicleClass, VehicleHandle};
use v2v_env::{ActorId, V2VContext, VehicleId};

/// RNG stream feeding the oracle's snapshot noise.
const PHYSICS_STREAM: u64 = 1;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Simulation step rate in Hz (usually well above the V2V rate)
    pub tick_rate_hz: u32,

    /// Position noise standard deviation applied to snapshots
    pub sensor_noise_std: f64,

    /// Coordinator under test
    pub coordinator: CoordinatorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 20,
            sensor_noise_std: 0.0,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    context: Arc<SimContext>,

    /// Ground truth oracle
    oracle: Oracle,

    coordinator: V2VCoordinator<SimContext>,

    /// V2V id -> simulator actor
    vehicles: BTreeMap<VehicleId, ActorId>,

    next_vehicle_id: u32,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        if config.tick_rate_hz == 0 {
            return Err(SimError::InvalidTickRate(config.tick_rate_hz));
        }

        let context = SimContext::shared(config.seed);
        let mut oracle = Oracle::new(context.derive_seed(PHYSICS_STREAM));
        oracle.set_position_noise(config.sensor_noise_std)?;
        let coordinator = V2VCoordinator::new(Arc::clone(&context), config.coordinator.clone())?;

        Ok(Self {
            config,
            context,
            oracle,
            coordinator,
            vehicles: BTreeMap::new(),
            next_vehicle_id: 1,
            tick_count: 0,
        })
    }

    /// Spawns a vehicle in the oracle and registers it for V2V.
    pub fn spawn_vehicle(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        class: VehicleClass,
    ) -> Result<VehicleId, SimError> {
        let actor_id = self.oracle.spawn_vehicle(position, velocity, class);
        let vehicle_id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;

        self.coordinator.register(vehicle_id, VehicleHandle::new(actor_id, class))?;
        self.vehicles.insert(vehicle_id, actor_id);
        Ok(vehicle_id)
    }

    /// Destroys the actor but leaves the vehicle registered, as when the
    /// simulator removes an actor before the host notices.
    pub fn destroy_actor(&mut self, vehicle_id: VehicleId) -> bool {
        match self.vehicles.get(&vehicle_id) {
            Some(actor_id) => self.oracle.remove_vehicle(*actor_id),
            None => false,
        }
    }

    /// Destroys the actor and unregisters the vehicle.
    pub fn remove_vehicle(&mut self, vehicle_id: VehicleId) {
        self.destroy_actor(vehicle_id);
        self.coordinator.unregister(vehicle_id);
        self.vehicles.remove(&vehicle_id);
        debug!("Vehicle {} removed from world", vehicle_id);
    }

    /// Makes the vehicle's next snapshot entry non-finite.
    pub fn corrupt_position(&mut self, vehicle_id: VehicleId) {
        if let Some(actor_id) = self.vehicles.get(&vehicle_id) {
            self.oracle.corrupt_next_snapshot(*actor_id);
        }
    }

    /// Starts braking a vehicle along its direction of travel.
    pub fn brake(&mut self, vehicle_id: VehicleId, decel: f64) {
        if let Some(actor_id) = self.vehicles.get(&vehicle_id) {
            self.oracle.brake(*actor_id, decel);
        }
    }

    /// Opts every registered vehicle into cooperative sharing.
    pub fn enable_sharing_all(&self) {
        for id in self.vehicles.keys() {
            self.coordinator.enable_bidirectional_sharing(*id);
        }
    }

    /// Wall-clock length of one simulation step.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.config.tick_rate_hz))
    }

    /// Advances simulation by one tick and offers the result to the coordinator.
    pub fn tick(&mut self) -> UpdateOutcome {
        let interval = self.tick_interval();

        // Advance virtual time
        self.context.advance_time(interval);

        // Advance physics, then snapshot the fresh state
        self.oracle.step(interval.as_secs_f64());
        let snapshot = self.oracle.snapshot();

        self.tick_count += 1;
        self.coordinator.update(&snapshot)
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the number of registered vehicles.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.keys().copied().collect()
    }

    pub fn coordinator(&self) -> &V2VCoordinator<SimContext> {
        &self.coordinator
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.context
    }
}
