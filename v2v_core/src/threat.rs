//! The Threat Assessor - constant-velocity Time-To-Collision.
//!
//! Both vehicles are projected forward along their current velocity. TTC is
//! the time at which the projected separation is smallest, defined only
//! while the pair is closing. The (distance, TTC) pair is then mapped to a
//! discrete [`ThreatLevel`].
//!
//! TTC is computed relative to the subject, so `assess(A, B)` and
//! `assess(B, A)` are evaluated independently and may disagree.

use crate::messages::SafetyMessage;
use serde::{Deserialize, Serialize};
use v2v_env::VehicleId;

/// Beyond this distance (meters) no pair is a threat.
pub const THREAT_DISTANCE_M: f64 = 50.0;

/// Upper TTC bound (seconds, inclusive) of the Critical band.
pub const CRITICAL_TTC_S: f64 = 1.0;
/// Upper TTC bound of the Warning band.
pub const WARNING_TTC_S: f64 = 2.0;
/// Upper TTC bound of the Caution band.
pub const CAUTION_TTC_S: f64 = 3.0;
/// Upper TTC bound of the Monitor band.
pub const MONITOR_TTC_S: f64 = 5.0;

/// Separations below this are treated as co-located.
const COLOCATED_EPSILON_M: f64 = 1e-9;

/// Discrete collision risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ThreatLevel {
    #[default]
    None = 0,
    Monitor = 1,
    Caution = 2,
    Warning = 3,
    Critical = 4,
}

impl ThreatLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThreatLevel::None => "none",
            ThreatLevel::Monitor => "monitor",
            ThreatLevel::Caution => "caution",
            ThreatLevel::Warning => "warning",
            ThreatLevel::Critical => "critical",
        }
    }
}

impl From<ThreatLevel> for u8 {
    fn from(level: ThreatLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for ThreatLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ThreatLevel::None),
            1 => Ok(ThreatLevel::Monitor),
            2 => Ok(ThreatLevel::Caution),
            3 => Ok(ThreatLevel::Warning),
            4 => Ok(ThreatLevel::Critical),
            other => Err(format!("Threat level out of range: {}", other)),
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.name())
    }
}

/// Risk of `other` as seen from `subject` at one accepted tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub subject_id: VehicleId,
    pub other_id: VehicleId,

    /// Current separation (meters)
    pub distance: f64,

    /// Seconds until closest approach; `None` when the pair is not closing
    pub time_to_collision: Option<f64>,

    pub threat_level: ThreatLevel,

    /// Timestamp of the subject's message
    pub timestamp: f64,
}

/// Maps (distance, TTC) to a threat band.
///
/// Each band is closed on its upper TTC bound: TTC of exactly 3 s is
/// Caution, not Monitor. Non-finite inputs are never a threat.
pub fn classify(distance: f64, time_to_collision: Option<f64>) -> ThreatLevel {
    // NaN fails this comparison too
    if !(distance <= THREAT_DISTANCE_M) {
        return ThreatLevel::None;
    }
    let ttc = match time_to_collision {
        Some(ttc) if ttc.is_finite() && ttc >= 0.0 => ttc,
        _ => return ThreatLevel::None,
    };

    if ttc <= CRITICAL_TTC_S {
        ThreatLevel::Critical
    } else if ttc <= WARNING_TTC_S {
        ThreatLevel::Warning
    } else if ttc <= CAUTION_TTC_S {
        ThreatLevel::Caution
    } else if ttc <= MONITOR_TTC_S {
        ThreatLevel::Monitor
    } else {
        ThreatLevel::None
    }
}

/// Constant-velocity TTC of `other` relative to `subject`.
///
/// With relative position `r = p_other - p_subject` and relative velocity
/// `v = v_other - v_subject`, the separation is smallest at
/// `t* = -(r·v) / |v|²`. Returns `None` unless `r·v < 0` (closing).
/// Co-located vehicles return `Some(0.0)`.
///
/// Swapping the pair negates both `r` and `v`, so the result is the same
/// in either direction.
pub fn time_to_collision(subject: &SafetyMessage, other: &SafetyMessage) -> Option<f64> {
    let r = other.position - subject.position;
    if r.norm() <= COLOCATED_EPSILON_M {
        return Some(0.0);
    }

    let v = other.velocity() - subject.velocity();
    let closing = r.dot(&v);
    if !(closing < 0.0) {
        return None;
    }

    let speed_sq = v.norm_squared();
    let ttc = -closing / speed_sq;
    ttc.is_finite().then_some(ttc)
}

/// Assesses `other` from the point of view of `subject`.
///
/// `distance` is the value already computed by discovery, so both
/// directions of a pair report the same separation.
pub fn assess(subject: &SafetyMessage, other: &SafetyMessage, distance: f64) -> ThreatRecord {
    let time_to_collision = time_to_collision(subject, other);
    ThreatRecord {
        subject_id: subject.vehicle_id,
        other_id: other.vehicle_id,
        distance,
        time_to_collision,
        threat_level: classify(distance, time_to_collision),
        timestamp: subject.timestamp,
    }
}

/// Orders records most severe first, nearest first within a level.
pub fn sort_by_severity(records: &mut [ThreatRecord]) {
    records.sort_by(|a, b| {
        b.threat_level
            .cmp(&a.threat_level)
            .then_with(|| a.distance.total_cmp(&b.distance))
            .then_with(|| a.other_id.cmp(&b.other_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::message_at;
    use approx::assert_relative_eq;

    #[test]
    fn test_concrete_bands() {
        assert_eq!(classify(10.0, Some(0.8)), ThreatLevel::Critical);
        assert_eq!(classify(10.0, Some(2.5)), ThreatLevel::Caution);
        assert_eq!(classify(60.0, Some(0.1)), ThreatLevel::None);
        assert_eq!(classify(5.0, None), ThreatLevel::None);
    }

    #[test]
    fn test_band_boundaries_closed_on_upper_ttc() {
        assert_eq!(classify(10.0, Some(1.0)), ThreatLevel::Critical);
        assert_eq!(classify(10.0, Some(2.0)), ThreatLevel::Warning);
        assert_eq!(classify(10.0, Some(3.0)), ThreatLevel::Caution);
        assert_eq!(classify(10.0, Some(5.0)), ThreatLevel::Monitor);
        assert_eq!(classify(10.0, Some(5.0 + 1e-9)), ThreatLevel::None);
        assert_eq!(classify(50.0, Some(0.5)), ThreatLevel::Critical);
    }

    #[test]
    fn test_non_finite_inputs_are_not_threats() {
        assert_eq!(classify(f64::NAN, Some(0.5)), ThreatLevel::None);
        assert_eq!(classify(10.0, Some(f64::NAN)), ThreatLevel::None);
        assert_eq!(classify(10.0, Some(f64::INFINITY)), ThreatLevel::None);
    }

    #[test]
    fn test_head_on_ttc() {
        // 38 m apart, closing at 10 + 10 m/s
        let a = message_at(1, [0.0, 0.0, 0.0], 10.0, 0.0);
        let b = message_at(2, [38.0, 0.0, 0.0], 10.0, 180.0);

        let ttc = time_to_collision(&a, &b).unwrap();
        assert_relative_eq!(ttc, 1.9, epsilon = 1e-9);

        let record = assess(&a, &b, 38.0);
        assert_eq!(record.threat_level, ThreatLevel::Warning);
        assert_eq!(record.subject_id, VehicleId(1));
        assert_eq!(record.other_id, VehicleId(2));
    }

    #[test]
    fn test_separating_pair_has_no_ttc() {
        let a = message_at(1, [0.0, 0.0, 0.0], 10.0, 180.0);
        let b = message_at(2, [5.0, 0.0, 0.0], 10.0, 0.0);

        assert_eq!(time_to_collision(&a, &b), None);
        assert_eq!(assess(&a, &b, 5.0).threat_level, ThreatLevel::None);
    }

    #[test]
    fn test_same_velocity_never_closes() {
        let a = message_at(1, [0.0, 0.0, 0.0], 20.0, 0.0);
        let b = message_at(2, [10.0, 0.0, 0.0], 20.0, 0.0);
        assert_eq!(time_to_collision(&a, &b), None);
    }

    #[test]
    fn test_crossing_paths_use_closest_approach() {
        // Subject heading +x, other heading -y from (20, 20): both reach
        // (20, 0) at t = 2 s
        let a = message_at(1, [0.0, 0.0, 0.0], 10.0, 0.0);
        let b = message_at(2, [20.0, 20.0, 0.0], 10.0, 270.0);

        let ttc = time_to_collision(&a, &b).unwrap();
        assert_relative_eq!(ttc, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ttc_same_from_either_side() {
        let slow = message_at(1, [0.0, 0.0, 0.0], 5.0, 30.0);
        let fast = message_at(2, [40.0, 10.0, 0.0], 15.0, 200.0);

        let forward = time_to_collision(&slow, &fast).unwrap();
        let backward = time_to_collision(&fast, &slow).unwrap();
        assert_relative_eq!(forward, backward, epsilon = 1e-12);
        assert_eq!(classify(20.0, Some(forward)), classify(20.0, Some(backward)));
    }

    #[test]
    fn test_colocated_is_immediate() {
        let a = message_at(1, [3.0, 3.0, 0.0], 0.0, 0.0);
        let b = message_at(2, [3.0, 3.0, 0.0], 0.0, 0.0);
        assert_eq!(time_to_collision(&a, &b), Some(0.0));
        assert_eq!(assess(&a, &b, 0.0).threat_level, ThreatLevel::Critical);
    }

    #[test]
    fn test_serde_as_integer() {
        assert_eq!(serde_json::to_string(&ThreatLevel::Warning).unwrap(), "3");
        let level: ThreatLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level, ThreatLevel::Caution);
        assert!(serde_json::from_str::<ThreatLevel>("7").is_err());
    }

    #[test]
    fn test_sort_by_severity() {
        let record = |other: u32, distance: f64, level: ThreatLevel| ThreatRecord {
            subject_id: VehicleId(1),
            other_id: VehicleId(other),
            distance,
            time_to_collision: None,
            threat_level: level,
            timestamp: 0.0,
        };
        let mut records = vec![
            record(2, 5.0, ThreatLevel::Monitor),
            record(3, 30.0, ThreatLevel::Critical),
            record(4, 10.0, ThreatLevel::Critical),
        ];
        sort_by_severity(&mut records);
        let order: Vec<u32> = records.iter().map(|r| r.other_id.0).collect();
        assert_eq!(order, vec![4, 3, 2]);
    }
}
