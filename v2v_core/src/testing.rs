//! Test fixtures shared by the unit tests.

use crate::messages::{
    Acceleration, BrakeStatus, SafetyMessage, TransmissionState, VehicleClass, MESSAGE_VERSION,
};
use async_trait::async_trait;
use nalgebra::Vector3;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use v2v_env::{ActorId, ActorSnapshot, FrameSnapshot, V2VContext, VehicleId};

/// A hand-driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

#[async_trait]
impl V2VContext for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A well-formed message at `pos` moving at `speed` along `heading`.
pub fn message_at(id: u32, pos: [f64; 3], speed: f64, heading: f64) -> SafetyMessage {
    let class = VehicleClass::PassengerCar;
    SafetyMessage {
        version: MESSAGE_VERSION,
        vehicle_id: VehicleId(id),
        timestamp: 0.0,
        sequence: 0,
        vehicle_class: class,
        position: Vector3::new(pos[0], pos[1], pos[2]),
        speed,
        heading,
        steering_angle: 0.0,
        acceleration: Acceleration::default(),
        dimensions: class.default_dimensions(),
        brake_status: BrakeStatus::None,
        brake_pressure: 0.0,
        transmission_state: TransmissionState::Drive,
        extended: None,
    }
}

/// Stationary messages keyed by id.
pub fn fleet(layout: &[(u32, [f64; 3])]) -> BTreeMap<VehicleId, SafetyMessage> {
    layout.iter()
        .map(|(id, pos)| (VehicleId(*id), message_at(*id, *pos, 0.0, 0.0)))
        .collect()
}

/// Snapshot entry for actor `actor` at `pos`, driving along `yaw_deg` at `speed`.
pub fn actor_at(actor: u64, pos: [f64; 3], speed: f64, yaw_deg: f64) -> ActorSnapshot {
    let yaw = yaw_deg.to_radians();
    ActorSnapshot::new(
        ActorId(actor),
        Vector3::new(pos[0], pos[1], pos[2]),
        Vector3::new(yaw.cos() * speed, yaw.sin() * speed, 0.0),
        yaw_deg,
    )
}

/// Snapshot with stationary actors `1..=n` spaced `spacing` meters along x.
pub fn line_snapshot(timestamp: f64, n: u64, spacing: f64) -> FrameSnapshot {
    let mut snapshot = FrameSnapshot::new(timestamp);
    for actor in 1..=n {
        snapshot.insert(actor_at(actor, [(actor - 1) as f64 * spacing, 0.0, 0.0], 0.0, 0.0));
    }
    snapshot
}
