//! Message Builder - snapshot + vehicle metadata -> [`SafetyMessage`].
//!
//! Pure: no clock, no hidden state. Anything that depends on previous ticks
//! (speed history, path breadcrumbs) is passed in through [`BuildInputs`].

use crate::messages::{
    Acceleration, BrakeStatus, Dimensions, ExtendedData, PathPoint, SafetyMessage,
    TransmissionState, VehicleClass, MESSAGE_VERSION, SEQUENCE_MODULUS,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use v2v_env::{ActorId, ActorSnapshot, EnvError, VehicleId, WorldSnapshot};

/// Full-lock steering wheel angle mapped from a steer input of ±1.0.
pub const MAX_STEERING_ANGLE_DEG: f64 = 70.0;

/// Brake pedal above this is reported as applied.
pub const BRAKE_APPLIED_THRESHOLD: f64 = 0.1;

/// Brake pedal above this is reported as an emergency stop.
pub const BRAKE_EMERGENCY_THRESHOLD: f64 = 0.5;

/// Below this speed (m/s) a vehicle counts as standing still.
pub const STANDSTILL_SPEED: f64 = 0.1;

/// Static metadata for a registered vehicle.
///
/// The handle does not own any kinematic state; it only tells the builder
/// which simulator actor to look up and how to classify it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleHandle {
    /// Simulator actor backing this vehicle
    pub actor_id: ActorId,

    pub class: VehicleClass,

    pub dimensions: Dimensions,
}

impl VehicleHandle {
    /// Creates a handle using the class's typical dimensions.
    pub fn new(actor_id: ActorId, class: VehicleClass) -> Self {
        Self {
            actor_id,
            class,
            dimensions: class.default_dimensions(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Speed observed on the previous accepted tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub speed: f64,
    pub timestamp: f64,
}

/// Cross-tick inputs supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildInputs<'a> {
    /// Previous sample, used to derive longitudinal acceleration when the
    /// snapshot does not carry one
    pub previous: Option<MotionSample>,

    /// Breadcrumbs recorded on earlier ticks (oldest first)
    pub path_history: &'a [PathPoint],

    /// Attach BSM Part II when there is anything to put in it
    pub extended: bool,
}

/// Builds the safety message for one vehicle.
///
/// # Arguments
/// * `handle` - Registered vehicle metadata
/// * `vehicle_id` - V2V identifier of the sender
/// * `sequence` - Message counter to stamp (reduced modulo 128)
/// * `snapshot` - World snapshot taken right after the tick advanced
/// * `inputs` - Cross-tick history
///
/// # Errors
/// Propagates [`EnvError::ActorNotFound`] when the snapshot has no entry
/// for the vehicle's actor.
pub fn build_message<S>(
    handle: &VehicleHandle,
    vehicle_id: VehicleId,
    sequence: u8,
    snapshot: &S,
    inputs: BuildInputs<'_>,
) -> Result<SafetyMessage, EnvError>
where
    S: WorldSnapshot + ?Sized,
{
    let timestamp = snapshot.timestamp();
    let actor = snapshot.find(handle.actor_id)?;

    let speed = actor.speed();
    let heading = normalize_heading(actor.yaw_deg);
    let acceleration = derive_acceleration(actor, heading, speed, timestamp, inputs.previous);
    let brake_pressure = unit_or_zero(actor.control.brake);

    let extended = if inputs.extended {
        extended_data(handle, actor, inputs.path_history)
    } else {
        None
    };

    Ok(SafetyMessage {
        version: MESSAGE_VERSION,
        vehicle_id,
        timestamp,
        sequence: sequence % SEQUENCE_MODULUS,
        vehicle_class: handle.class,
        position: actor.location,
        speed,
        heading,
        steering_angle: signed_unit_or_zero(actor.control.steer) * MAX_STEERING_ANGLE_DEG,
        acceleration,
        dimensions: handle.dimensions,
        brake_status: brake_status(brake_pressure),
        brake_pressure,
        transmission_state: transmission_state(actor, speed),
        extended,
    })
}

/// Maps any yaw to [0, 360).
pub fn normalize_heading(yaw_deg: f64) -> f64 {
    let heading = yaw_deg.rem_euclid(360.0);
    // rem_euclid of a tiny negative rounds up to exactly 360.0
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

fn brake_status(pressure: f64) -> BrakeStatus {
    if pressure > BRAKE_EMERGENCY_THRESHOLD {
        BrakeStatus::Emergency
    } else if pressure > BRAKE_APPLIED_THRESHOLD {
        BrakeStatus::Applied
    } else {
        BrakeStatus::None
    }
}

fn transmission_state(actor: &ActorSnapshot, speed: f64) -> TransmissionState {
    let control = &actor.control;
    if control.reverse {
        TransmissionState::Reverse
    } else if control.hand_brake && speed < STANDSTILL_SPEED {
        TransmissionState::Park
    } else if control.throttle > 0.0 || speed >= STANDSTILL_SPEED {
        TransmissionState::Drive
    } else {
        TransmissionState::Neutral
    }
}

/// Clamps a control input to [0, 1]; a non-finite reading counts as released.
fn unit_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn signed_unit_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Rotates the world-frame acceleration into (longitudinal, lateral, vertical).
fn derive_acceleration(
    actor: &ActorSnapshot,
    heading_deg: f64,
    speed: f64,
    timestamp: f64,
    previous: Option<MotionSample>,
) -> Acceleration {
    let heading = heading_deg.to_radians();
    let forward = Vector3::new(heading.cos(), heading.sin(), 0.0);
    let left = Vector3::new(-heading.sin(), heading.cos(), 0.0);

    match actor.acceleration {
        Some(accel) => Acceleration {
            longitudinal: accel.dot(&forward),
            lateral: accel.dot(&left),
            vertical: accel.z,
        },
        None => {
            let longitudinal = previous
                .map(|prev| {
                    let dt = timestamp - prev.timestamp;
                    if dt > 0.0 {
                        (speed - prev.speed) / dt
                    } else {
                        0.0
                    }
                })
                .unwrap_or(0.0);
            Acceleration {
                longitudinal,
                ..Acceleration::default()
            }
        }
    }
}

fn extended_data(
    handle: &VehicleHandle,
    actor: &ActorSnapshot,
    path_history: &[PathPoint],
) -> Option<ExtendedData> {
    let emergency_active = handle.class == VehicleClass::Emergency;
    let empty = path_history.is_empty()
        && !emergency_active
        && actor.lights.is_empty()
        && actor.wipers.is_empty();
    if empty {
        return None;
    }

    Some(ExtendedData {
        path_history: path_history.to_vec(),
        emergency_active,
        lights: actor.lights.clone(),
        wipers: actor.wipers.clone(),
    })
}
