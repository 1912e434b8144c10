//! Cooperative perception sharing policy.
//!
//! A vehicle that opted in shares its extra sensor data with a peer when
//! the peer is both close and risky. The decision is made per ordered pair:
//! A sharing with B says nothing about B sharing with A.

use crate::error::ConfigError;
use crate::threat::{ThreatLevel, ThreatRecord};
use serde::{Deserialize, Serialize};
use v2v_env::VehicleId;

/// Thresholds for triggering cooperative sharing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingPolicy {
    /// Peer must be at most this far away (meters, inclusive)
    pub distance_threshold_m: f64,

    /// Peer must be at least this risky
    pub threat_threshold: ThreatLevel,
}

impl Default for SharingPolicy {
    fn default() -> Self {
        Self {
            distance_threshold_m: 50.0,
            threat_threshold: ThreatLevel::Caution,
        }
    }
}

impl SharingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.distance_threshold_m.is_finite() && self.distance_threshold_m >= 0.0) {
            return Err(ConfigError::InvalidSharingDistance(self.distance_threshold_m));
        }
        Ok(())
    }

    /// Whether the subject of `record` should share with its other vehicle.
    pub fn should_share(&self, record: &ThreatRecord, sharing_enabled: bool) -> bool {
        sharing_enabled
            && record.distance <= self.distance_threshold_m
            && record.threat_level >= self.threat_threshold
    }
}

/// One triggered share: `from` sends its sensor data to `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooperativeShare {
    pub from: VehicleId,
    pub to: VehicleId,
    pub distance: f64,
    pub threat_level: ThreatLevel,
    pub timestamp: f64,
}

impl CooperativeShare {
    pub fn from_record(record: &ThreatRecord) -> Self {
        Self {
            from: record.subject_id,
            to: record.other_id,
            distance: record.distance,
            threat_level: record.threat_level,
            timestamp: record.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(distance: f64, level: ThreatLevel) -> ThreatRecord {
        ThreatRecord {
            subject_id: VehicleId(1),
            other_id: VehicleId(2),
            distance,
            time_to_collision: Some(1.5),
            threat_level: level,
            timestamp: 3.0,
        }
    }

    #[test]
    fn test_enabled_close_and_risky_shares() {
        let policy = SharingPolicy::default();
        assert!(policy.should_share(&record(40.0, ThreatLevel::Warning), true));
    }

    #[test]
    fn test_disabled_never_shares() {
        let policy = SharingPolicy::default();
        assert!(!policy.should_share(&record(40.0, ThreatLevel::Warning), false));
    }

    #[test]
    fn test_distance_gate() {
        let policy = SharingPolicy::default();
        assert!(!policy.should_share(&record(60.0, ThreatLevel::Critical), true));
        assert!(policy.should_share(&record(50.0, ThreatLevel::Caution), true));
    }

    #[test]
    fn test_threat_gate() {
        let policy = SharingPolicy::default();
        assert!(!policy.should_share(&record(10.0, ThreatLevel::Monitor), true));
    }

    #[test]
    fn test_invalid_distance_rejected() {
        let policy = SharingPolicy {
            distance_threshold_m: -1.0,
            ..SharingPolicy::default()
        };
        assert_eq!(policy.validate(), Err(ConfigError::InvalidSharingDistance(-1.0)));
    }

    #[test]
    fn test_share_event_from_record() {
        let share = CooperativeShare::from_record(&record(12.0, ThreatLevel::Critical));
        assert_eq!(share.from, VehicleId(1));
        assert_eq!(share.to, VehicleId(2));
        assert_eq!(share.threat_level, ThreatLevel::Critical);
    }
}
