//! Basic Safety Message model (SAE J2735 style).
//!
//! A [`SafetyMessage`] is the Part I core data every vehicle broadcasts on
//! each accepted tick. Part II ([`ExtendedData`]) rides along when available
//! and is never inspected by discovery or threat assessment.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use v2v_env::VehicleId;

/// Layout version of [`SafetyMessage`]. Bump on any field change.
pub const MESSAGE_VERSION: u8 = 1;

/// Message counters wrap at this value (J2735 `MsgCount` is 0..=127).
pub const SEQUENCE_MODULUS: u8 = 128;

/// Returns the sequence number that follows `sequence`.
#[inline]
pub fn next_sequence(sequence: u8) -> u8 {
    (sequence % SEQUENCE_MODULUS + 1) % SEQUENCE_MODULUS
}

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Vehicle classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VehicleClass {
    #[default]
    PassengerCar = 0,
    Bus = 1,
    Truck = 2,
    Motorcycle = 3,
    Emergency = 4,
    Unknown = 99,
}

impl VehicleClass {
    /// Human-readable name used in console output.
    pub fn name(&self) -> &'static str {
        match self {
            VehicleClass::PassengerCar => "passenger_car",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Emergency => "emergency",
            VehicleClass::Unknown => "unknown",
        }
    }

    /// Typical bounding box for the class, used when the simulator does not report one.
    pub fn default_dimensions(&self) -> Dimensions {
        match self {
            VehicleClass::PassengerCar | VehicleClass::Unknown => Dimensions::new(4.5, 1.8, 1.5),
            VehicleClass::Bus => Dimensions::new(12.0, 2.55, 3.2),
            VehicleClass::Truck => Dimensions::new(9.0, 2.5, 3.5),
            VehicleClass::Motorcycle => Dimensions::new(2.2, 0.8, 1.4),
            VehicleClass::Emergency => Dimensions::new(5.5, 2.0, 2.4),
        }
    }
}

impl std::str::FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passenger_car" | "car" => Ok(VehicleClass::PassengerCar),
            "bus" => Ok(VehicleClass::Bus),
            "truck" => Ok(VehicleClass::Truck),
            "motorcycle" | "bike" => Ok(VehicleClass::Motorcycle),
            "emergency" => Ok(VehicleClass::Emergency),
            "unknown" => Ok(VehicleClass::Unknown),
            _ => Err(format!("Unknown vehicle class: {}", s)),
        }
    }
}

/// Braking system status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrakeStatus {
    #[default]
    None,
    Applied,
    Emergency,
}

/// Transmission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionState {
    Drive,
    Reverse,
    Park,
    #[default]
    Neutral,
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Three-axis acceleration in the vehicle frame (m/s²).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub longitudinal: f64,
    pub lateral: f64,
    pub vertical: f64,
}

/// Vehicle bounding box (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self { length, width, height }
    }

    /// All three extents strictly positive and finite.
    pub fn is_valid(&self) -> bool {
        [self.length, self.width, self.height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        VehicleClass::PassengerCar.default_dimensions()
    }
}

/// One breadcrumb of the path history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Simulation time the point was recorded (seconds)
    pub timestamp: f64,
}

// ============================================================================
// BSM PART II
// ============================================================================

/// Optional extended data (BSM Part II).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedData {
    /// Recent positions, oldest first, bounded by the coordinator
    pub path_history: Vec<PathPoint>,

    /// Emergency vehicle with active status
    pub emergency_active: bool,

    /// Exterior light states as reported by the simulator
    pub lights: BTreeMap<String, String>,

    /// Wiper states as reported by the simulator
    pub wipers: BTreeMap<String, String>,
}

// ============================================================================
// BSM PART I
// ============================================================================

/// Basic Safety Message - core data, one per vehicle per accepted tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMessage {
    /// Record layout version ([`MESSAGE_VERSION`])
    pub version: u8,

    /// Sender
    pub vehicle_id: VehicleId,

    /// Simulation time of the snapshot this message was built from (seconds)
    pub timestamp: f64,

    /// Per-sender counter, 0..=127, wraps
    pub sequence: u8,

    pub vehicle_class: VehicleClass,

    /// Position [x, y, z] in the shared world frame (meters)
    pub position: Vector3<f64>,

    /// Speed over ground (m/s), never negative
    pub speed: f64,

    /// Heading in degrees, [0, 360)
    pub heading: f64,

    /// Steering wheel angle in degrees, signed
    pub steering_angle: f64,

    pub acceleration: Acceleration,

    pub dimensions: Dimensions,

    pub brake_status: BrakeStatus,

    /// Brake pressure [0.0 - 1.0]
    pub brake_pressure: f64,

    pub transmission_state: TransmissionState,

    /// Part II, attached when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedData>,
}

impl SafetyMessage {
    /// Velocity vector implied by speed and heading.
    ///
    /// Planar (z = 0). Points backwards along the heading while reversing.
    pub fn velocity(&self) -> Vector3<f64> {
        let heading = self.heading.to_radians();
        let direction = if self.transmission_state == TransmissionState::Reverse {
            -1.0
        } else {
            1.0
        };
        Vector3::new(heading.cos(), heading.sin(), 0.0) * (self.speed * direction)
    }

    /// Euclidean distance between the two senders' positions.
    #[inline]
    pub fn distance_to(&self, other: &SafetyMessage) -> f64 {
        (other.position - self.position).norm()
    }

    /// True when every numeric field used by discovery and threat
    /// assessment is finite.
    pub fn is_well_formed(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.speed.is_finite()
            && self.heading.is_finite()
            && self.timestamp.is_finite()
    }

    /// Whether this sender is an emergency vehicle with active status.
    pub fn is_emergency(&self) -> bool {
        self.extended
            .as_ref()
            .map(|ext| ext.emergency_active)
            .unwrap_or(false)
    }
}
