//! Ground truth oracle for simulation.
//!
//! The Oracle stands in for the traffic simulator:
//! - True kinematics of every vehicle actor
//! - Physics step (constant acceleration, no reversing through zero)
//! - Per-tick [`FrameSnapshot`]s, optionally with position noise or
//!   deliberately corrupted entries

use crate::error::SimError;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use v2v_core::VehicleClass;
use v2v_env::{ActorId, ActorSnapshot, FrameSnapshot, VehicleControl};

/// Below this speed the yaw is held instead of recomputed from velocity.
const YAW_HOLD_SPEED: f64 = 0.1;

/// Deceleration (m/s²) that maps to a fully pressed brake pedal.
const FULL_BRAKE_DECEL: f64 = 8.0;

/// Acceleration (m/s²) that maps to full throttle.
const FULL_THROTTLE_ACCEL: f64 = 3.0;

/// A ground truth vehicle in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthVehicle {
    pub actor_id: ActorId,

    pub class: VehicleClass,

    /// Position [x, y, z] in meters (world frame)
    pub position: Vector3<f64>,

    /// Velocity [vx, vy, vz] in m/s
    pub velocity: Vector3<f64>,

    /// Commanded acceleration in m/s² (world frame)
    pub acceleration: Vector3<f64>,

    /// Yaw in degrees
    pub yaw_deg: f64,

    /// Exterior lights reported to the builder
    pub lights: BTreeMap<String, String>,
}

impl GroundTruthVehicle {
    pub fn new(actor_id: ActorId, position: Vector3<f64>, velocity: Vector3<f64>, class: VehicleClass) -> Self {
        let yaw_deg = if velocity.norm() > YAW_HOLD_SPEED {
            velocity.y.atan2(velocity.x).to_degrees()
        } else {
            0.0
        };
        Self {
            actor_id,
            class,
            position,
            velocity,
            acceleration: Vector3::zeros(),
            yaw_deg,
            lights: BTreeMap::new(),
        }
    }

    /// Driver inputs implied by the commanded acceleration.
    pub fn control(&self) -> VehicleControl {
        let speed = self.velocity.norm();
        let along = if speed > YAW_HOLD_SPEED {
            self.acceleration.dot(&(self.velocity / speed))
        } else {
            self.acceleration.norm()
        };

        VehicleControl {
            throttle: if along > 0.0 { (along / FULL_THROTTLE_ACCEL).min(1.0) } else { 0.0 },
            brake: if along < 0.0 { (-along / FULL_BRAKE_DECEL).min(1.0) } else { 0.0 },
            steer: 0.0,
            hand_brake: false,
            reverse: false,
        }
    }

    /// Snapshot entry for this vehicle.
    pub fn to_snapshot(&self) -> ActorSnapshot {
        let mut actor = ActorSnapshot::new(self.actor_id, self.position, self.velocity, self.yaw_deg);
        actor.acceleration = Some(self.acceleration);
        actor.control = self.control();
        actor.lights = self.lights.clone();
        actor
    }
}

/// The Oracle - maintains ground truth and produces snapshots.
pub struct Oracle {
    /// RNG for snapshot noise
    physics_rng: ChaCha8Rng,

    /// All vehicles ever spawned, by actor id
    vehicles: BTreeMap<ActorId, GroundTruthVehicle>,

    /// Next actor ID
    next_id: u64,

    /// Current simulation time (seconds)
    current_time: f64,

    /// Position noise applied to snapshots
    position_noise: Option<Normal<f64>>,

    /// Actors whose next snapshot entry is corrupted
    corrupted: HashSet<ActorId>,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    pub fn new(physics_seed: u64) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            vehicles: BTreeMap::new(),
            next_id: 1,
            current_time: 0.0,
            position_noise: None,
            corrupted: HashSet::new(),
        }
    }

    /// Sets the snapshot position noise (standard deviation, meters). 0 disables it.
    pub fn set_position_noise(&mut self, std_dev: f64) -> Result<(), SimError> {
        if std_dev == 0.0 {
            self.position_noise = None;
            return Ok(());
        }
        if !(std_dev.is_finite() && std_dev > 0.0) {
            return Err(SimError::InvalidNoise(std_dev));
        }
        let normal = Normal::new(0.0, std_dev).map_err(|_| SimError::InvalidNoise(std_dev))?;
        self.position_noise = Some(normal);
        Ok(())
    }

    /// Spawns a new vehicle and returns its actor ID.
    pub fn spawn_vehicle(&mut self, position: Vector3<f64>, velocity: Vector3<f64>, class: VehicleClass) -> ActorId {
        let actor_id = ActorId(self.next_id);
        self.next_id += 1;

        let mut vehicle = GroundTruthVehicle::new(actor_id, position, velocity, class);
        if class == VehicleClass::Emergency {
            vehicle.lights.insert("siren".to_string(), "on".to_string());
        }
        self.vehicles.insert(actor_id, vehicle);

        actor_id
    }

    /// Destroys a vehicle. It disappears from every later snapshot.
    pub fn remove_vehicle(&mut self, actor_id: ActorId) -> bool {
        self.corrupted.remove(&actor_id);
        self.vehicles.remove(&actor_id).is_some()
    }

    /// Commands a constant acceleration (world frame).
    pub fn set_acceleration(&mut self, actor_id: ActorId, acceleration: Vector3<f64>) {
        if let Some(vehicle) = self.vehicles.get_mut(&actor_id) {
            vehicle.acceleration = acceleration;
        }
    }

    /// Brakes along the current direction of travel.
    pub fn brake(&mut self, actor_id: ActorId, decel: f64) {
        if let Some(vehicle) = self.vehicles.get_mut(&actor_id) {
            let speed = vehicle.velocity.norm();
            if speed > YAW_HOLD_SPEED {
                vehicle.acceleration = -vehicle.velocity / speed * decel.abs();
            }
        }
    }

    /// Makes the actor's next snapshot entry carry a non-finite position.
    pub fn corrupt_next_snapshot(&mut self, actor_id: ActorId) {
        self.corrupted.insert(actor_id);
    }

    /// Advances physics by dt seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;

        for vehicle in self.vehicles.values_mut() {
            let before = vehicle.velocity;
            vehicle.velocity += vehicle.acceleration * dt;

            // Braking stops the vehicle, it never drives it backwards
            if vehicle.velocity.dot(&before) < 0.0 {
                vehicle.velocity = Vector3::zeros();
                vehicle.acceleration = Vector3::zeros();
            }

            vehicle.position += vehicle.velocity * dt;

            if vehicle.velocity.norm() > YAW_HOLD_SPEED {
                vehicle.yaw_deg = vehicle.velocity.y.atan2(vehicle.velocity.x).to_degrees();
            }
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    /// Returns all vehicles still in the world.
    pub fn active_vehicles(&self) -> Vec<&GroundTruthVehicle> {
        self.vehicles.values().collect()
    }

    /// Returns a specific vehicle by actor ID.
    pub fn vehicle(&self, actor_id: ActorId) -> Option<&GroundTruthVehicle> {
        self.vehicles.get(&actor_id)
    }

    /// Takes the snapshot for the current tick.
    ///
    /// Must be called after [`Oracle::step`] so the kinematics are fresh.
    pub fn snapshot(&mut self) -> FrameSnapshot {
        let mut snapshot = FrameSnapshot::new(self.current_time);

        for vehicle in self.vehicles.values() {
            let mut actor = vehicle.to_snapshot();
            if let Some(noise) = &self.position_noise {
                actor.location += Vector3::new(
                    noise.sample(&mut self.physics_rng),
                    noise.sample(&mut self.physics_rng),
                    0.0,
                );
            }
            if self.corrupted.contains(&vehicle.actor_id) {
                actor.location.x = f64::NAN;
            }
            snapshot.insert(actor);
        }
        self.corrupted.clear();

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use v2v_env::WorldSnapshot;

    #[test]
    fn test_oracle_spawn_vehicle() {
        let mut oracle = Oracle::new(42);

        let id = oracle.spawn_vehicle(
            Vector3::new(100.0, 200.0, 0.0),
            Vector3::new(0.0, 10.0, 0.0),
            VehicleClass::Bus,
        );

        let vehicle = oracle.vehicle(id).unwrap();
        assert_eq!(vehicle.position.x, 100.0);
        assert_eq!(vehicle.class, VehicleClass::Bus);
        assert!((vehicle.yaw_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_oracle_physics_step() {
        let mut oracle = Oracle::new(42);

        let id = oracle.spawn_vehicle(
            Vector3::zeros(),
            Vector3::new(20.0, 0.0, 0.0), // 20 m/s in x direction
            VehicleClass::PassengerCar,
        );

        oracle.step(1.0); // 1 second

        let vehicle = oracle.vehicle(id).unwrap();
        assert!((vehicle.position.x - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_braking_stops_without_reversing() {
        let mut oracle = Oracle::new(42);
        let id = oracle.spawn_vehicle(Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0), VehicleClass::PassengerCar);
        oracle.brake(id, 6.0);

        let control = oracle.vehicle(id).unwrap().control();
        assert!((control.brake - 0.75).abs() < 1e-9);
        assert_eq!(control.throttle, 0.0);

        for _ in 0..40 {
            oracle.step(0.1);
        }
        let vehicle = oracle.vehicle(id).unwrap();
        assert_eq!(vehicle.velocity, Vector3::zeros());
        assert!(vehicle.position.x > 0.0);
    }

    #[test]
    fn test_removed_vehicle_missing_from_snapshot() {
        let mut oracle = Oracle::new(1);
        let a = oracle.spawn_vehicle(Vector3::zeros(), Vector3::zeros(), VehicleClass::PassengerCar);
        let b = oracle.spawn_vehicle(Vector3::new(5.0, 0.0, 0.0), Vector3::zeros(), VehicleClass::PassengerCar);

        assert!(oracle.remove_vehicle(b));
        assert!(!oracle.remove_vehicle(b));
        assert!(oracle.vehicle(b).is_none());
        assert_eq!(oracle.active_vehicles().len(), 1);

        let snapshot = oracle.snapshot();
        assert!(snapshot.find(a).is_ok());
        assert!(snapshot.find(b).is_err());
    }

    #[test]
    fn test_corruption_lasts_one_snapshot() {
        let mut oracle = Oracle::new(1);
        let a = oracle.spawn_vehicle(Vector3::zeros(), Vector3::zeros(), VehicleClass::PassengerCar);

        oracle.corrupt_next_snapshot(a);
        assert!(oracle.snapshot().find(a).unwrap().location.x.is_nan());
        assert!(oracle.snapshot().find(a).unwrap().location.x.is_finite());
    }

    #[test]
    fn test_oracle_deterministic_noise() {
        let mut oracle1 = Oracle::new(42);
        let mut oracle2 = Oracle::new(42);
        oracle1.set_position_noise(0.5).unwrap();
        oracle2.set_position_noise(0.5).unwrap();

        let id1 = oracle1.spawn_vehicle(Vector3::zeros(), Vector3::zeros(), VehicleClass::PassengerCar);
        let id2 = oracle2.spawn_vehicle(Vector3::zeros(), Vector3::zeros(), VehicleClass::PassengerCar);

        let reading1 = oracle1.snapshot().find(id1).unwrap().location;
        let reading2 = oracle2.snapshot().find(id2).unwrap().location;

        // Same seed = same noise
        assert_eq!(reading1, reading2);
        assert!(oracle1.set_position_noise(-1.0).is_err());
    }
}
