//! JSON exporter for offline visualization.
//!
//! One frame per accepted coordinator tick: what every vehicle broadcast,
//! who it could hear and which pairs were rated Caution or worse.

use crate::error::SimError;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v2v_core::{PublishedState, ThreatLevel};

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Coordinator tick that produced this frame
    pub tick: u64,

    pub vehicles: Vec<VehicleFrame>,

    /// Pairs at Caution or above, worst first
    pub threats: Vec<ThreatEvent>,

    /// Events (actor loss, unregistration, braking, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Broadcast state of one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleFrame {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub speed: f64,
    pub heading: f64,
    pub sequence: u8,
    pub neighbors: Vec<u32>,
}

/// One directed threat assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatEvent {
    pub subject: u32,
    pub other: u32,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttc: Option<f64>,
    pub level: ThreatLevel,
    pub shared: bool,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warning".to_string()),
        }
    }
}

impl SimFrame {
    /// Builds a frame from the coordinator's published state.
    pub fn from_state(time_sec: f64, state: &PublishedState, events: Vec<SimEvent>) -> Self {
        let vehicles = state
            .messages
            .values()
            .map(|msg| VehicleFrame {
                id: msg.vehicle_id.0,
                x: msg.position.x,
                y: msg.position.y,
                z: msg.position.z,
                speed: msg.speed,
                heading: msg.heading,
                sequence: msg.sequence,
                neighbors: state
                    .neighbors
                    .get(&msg.vehicle_id)
                    .map(|list| list.iter().map(|n| n.vehicle_id.0).collect())
                    .unwrap_or_default(),
            })
            .collect();

        let mut threats: Vec<ThreatEvent> = state
            .threats
            .values()
            .flatten()
            .filter(|record| record.threat_level >= ThreatLevel::Caution)
            .map(|record| ThreatEvent {
                subject: record.subject_id.0,
                other: record.other_id.0,
                distance: record.distance,
                ttc: record.time_to_collision,
                level: record.threat_level,
                shared: state
                    .shares
                    .iter()
                    .any(|s| s.from == record.subject_id && s.to == record.other_id),
            })
            .collect();
        threats.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| a.distance.total_cmp(&b.distance))
                .then_with(|| (a.subject, a.other).cmp(&(b.subject, b.other)))
        });

        let mut events = events;
        events.extend(
            state
                .failures
                .iter()
                .map(|f| SimEvent::warning(f.reason.clone())),
        );
        events.extend(
            state
                .malformed
                .iter()
                .map(|id| SimEvent::warning(format!("{} sent a malformed message", id))),
        );

        Self {
            time_sec,
            tick: state.tick,
            vehicles,
            threats,
            events,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use nalgebra::Vector3;
    use v2v_core::{CoordinatorConfig, V2VCoordinator, VehicleClass, VehicleHandle};
    use v2v_env::{ActorId, ActorSnapshot, FrameSnapshot, VehicleId};

    fn head_on_state() -> PublishedState {
        let mut coordinator = V2VCoordinator::new(SimContext::shared(3), CoordinatorConfig::default()).unwrap();
        let mut snapshot = FrameSnapshot::new(1.5);
        for (i, (x, vx, yaw)) in [(0.0, 10.0, 0.0), (15.0, -10.0, 180.0), (120.0, 10.0, 0.0)].iter().enumerate() {
            let id = i as u32 + 1;
            coordinator
                .register(VehicleId(id), VehicleHandle::new(ActorId(id as u64), VehicleClass::PassengerCar))
                .unwrap();
            coordinator.enable_bidirectional_sharing(VehicleId(id));
            snapshot.insert(ActorSnapshot::new(
                ActorId(id as u64),
                Vector3::new(*x, 0.0, 0.0),
                Vector3::new(*vx, 0.0, 0.0),
                *yaw,
            ));
        }
        coordinator.force_update(&snapshot);
        coordinator.published().as_ref().clone()
    }

    #[test]
    fn test_frame_from_state() {
        let state = head_on_state();
        let frame = SimFrame::from_state(1.5, &state, vec![SimEvent::info("start")]);

        assert_eq!(frame.tick, 1);
        assert_eq!(frame.vehicles.len(), 3);
        assert_eq!(frame.vehicles[0].neighbors, vec![2, 3]);
        assert_eq!(frame.events.len(), 1);

        // 15 m apart closing at 20 m/s: TTC 0.75 s, both directions, both shared
        assert_eq!(frame.threats.len(), 2);
        assert!(frame.threats.iter().all(|t| t.level == ThreatLevel::Critical && t.shared));
        assert_eq!((frame.threats[0].subject, frame.threats[0].other), (1, 2));
    }

    #[test]
    fn test_export_serializes_levels_as_numbers() {
        let state = head_on_state();
        let mut export = SimExport::new("head_on", 3);
        export.add_frame(SimFrame::from_state(1.5, &state, Vec::new()));
        export.finalize(true, None);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["duration_sec"], 1.5);
        assert_eq!(json["frames"][0]["threats"][0]["level"], 4);
        assert!(json.get("failure_reason").is_none());
        assert!(json["frames"][0].get("events").is_none());
    }
}
