//! Runtime invariant checks over the coordinator's published state.
//!
//! Run after every accepted tick. A violation is a coordinator bug, never
//! an expected scenario outcome.

use std::collections::HashMap;
use tracing::warn;
use v2v_core::messages::next_sequence;
use v2v_core::threat::classify;
use v2v_core::{discover, CoordinatorConfig, PublishedState, Registry, SharingPolicy, V2VCoordinator};
use v2v_env::{V2VContext, VehicleId};

/// Violations kept verbatim; the rest are only counted.
const MAX_RECORDED_VIOLATIONS: usize = 20;

/// Tracks cross-tick expectations and collects violations.
#[derive(Debug)]
pub struct InvariantChecker {
    max_range: f64,
    sharing: SharingPolicy,
    threat_stage: bool,

    /// Last sequence seen per continuously registered vehicle
    last_sequence: HashMap<VehicleId, u8>,

    violation_count: u64,
    violations: Vec<String>,
}

impl InvariantChecker {
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            max_range: config.max_range_m,
            sharing: config.sharing,
            threat_stage: config.stages.threat_assessment,
            last_sequence: HashMap::new(),
            violation_count: 0,
            violations: Vec::new(),
        }
    }

    /// Forgets a vehicle that left the network.
    pub fn forget(&mut self, id: VehicleId) {
        self.last_sequence.remove(&id);
    }

    pub fn violation_count(&self) -> u64 {
        self.violation_count
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violation_count == 0
    }

    /// Checks the state published by the last accepted tick.
    pub fn check<Ctx: V2VContext>(&mut self, coordinator: &V2VCoordinator<Ctx>) {
        let state = coordinator.published();
        let registry = coordinator.registry();

        self.check_membership(&state, &registry);
        self.check_neighbors(&state);
        self.check_threats(&state);
        self.check_shares(&state, &registry);
        self.check_sequences(&state);
    }

    fn violation(&mut self, tick: u64, message: String) {
        warn!("Invariant violated on tick {}: {}", tick, message);
        self.violation_count += 1;
        if self.violations.len() < MAX_RECORDED_VIOLATIONS {
            self.violations.push(format!("tick {}: {}", tick, message));
        }
    }

    fn check_membership(&mut self, state: &PublishedState, registry: &Registry) {
        let stray: Vec<VehicleId> = state
            .messages
            .keys()
            .chain(state.neighbors.keys())
            .chain(state.threats.keys())
            .filter(|id| !registry.contains(**id))
            .copied()
            .collect();
        for id in stray {
            self.violation(state.tick, format!("{} published but not registered", id));
        }
    }

    fn check_neighbors(&mut self, state: &PublishedState) {
        let tick = state.tick;
        let mut problems = Vec::new();

        for (subject, list) in &state.neighbors {
            for pair in list.windows(2) {
                let ordered = pair[0]
                    .distance
                    .total_cmp(&pair[1].distance)
                    .then_with(|| pair[0].vehicle_id.cmp(&pair[1].vehicle_id))
                    .is_lt();
                if !ordered {
                    problems.push(format!("{} neighbor list not sorted", subject));
                }
            }

            for record in list {
                if record.vehicle_id == *subject {
                    problems.push(format!("{} is its own neighbor", subject));
                }
                if record.distance > self.max_range {
                    problems.push(format!(
                        "{} -> {} at {:.3} m exceeds range {:.3} m",
                        subject, record.vehicle_id, record.distance, self.max_range
                    ));
                }
                let mirrored = state
                    .neighbors
                    .get(&record.vehicle_id)
                    .and_then(|back| back.iter().find(|r| r.vehicle_id == *subject));
                match mirrored {
                    Some(back) if back.distance == record.distance => {}
                    Some(_) => problems.push(format!(
                        "{} <-> {} asymmetric distance",
                        subject, record.vehicle_id
                    )),
                    None => problems.push(format!(
                        "{} lists {} but not the reverse",
                        subject, record.vehicle_id
                    )),
                }
            }
        }

        // Whatever index the coordinator used, the relation must match brute force
        let reference = discover(&state.messages, self.max_range);
        if reference.neighbors != state.neighbors {
            problems.push("neighbor relation differs from brute-force discovery".to_string());
        }

        for problem in problems {
            self.violation(tick, problem);
        }
    }

    fn check_threats(&mut self, state: &PublishedState) {
        let tick = state.tick;
        let mut problems = Vec::new();

        if self.threat_stage {
            for (subject, neighbors) in &state.neighbors {
                let assessed = state.threats.get(subject).map(Vec::len).unwrap_or(0);
                if assessed != neighbors.len() {
                    problems.push(format!(
                        "{} has {} neighbors but {} threat records",
                        subject,
                        neighbors.len(),
                        assessed
                    ));
                }
            }
        }

        for (subject, records) in &state.threats {
            for record in records {
                if record.subject_id != *subject {
                    problems.push(format!("threat filed under {} has subject {}", subject, record.subject_id));
                }
                let neighbor = state
                    .neighbors
                    .get(subject)
                    .and_then(|list| list.iter().find(|n| n.vehicle_id == record.other_id));
                if neighbor.map(|n| n.distance) != Some(record.distance) {
                    problems.push(format!("threat {} -> {} is not a neighbor pair", subject, record.other_id));
                }
                let expected = classify(record.distance, record.time_to_collision);
                if record.threat_level != expected {
                    problems.push(format!(
                        "threat {} -> {} level {} but band says {}",
                        subject, record.other_id, record.threat_level, expected
                    ));
                }
            }
        }

        for problem in problems {
            self.violation(tick, problem);
        }
    }

    fn check_shares(&mut self, state: &PublishedState, registry: &Registry) {
        let tick = state.tick;
        let mut problems = Vec::new();

        for share in &state.shares {
            let record = state
                .threats
                .get(&share.from)
                .and_then(|records| records.iter().find(|r| r.other_id == share.to));
            let justified = record
                .map(|r| self.sharing.should_share(r, registry.sharing_enabled(share.from)))
                .unwrap_or(false);
            if !justified {
                problems.push(format!("unjustified share {} -> {}", share.from, share.to));
            }
        }

        for problem in problems {
            self.violation(tick, problem);
        }
    }

    fn check_sequences(&mut self, state: &PublishedState) {
        let mut problems = Vec::new();

        for (id, msg) in &state.messages {
            if let Some(previous) = self.last_sequence.insert(*id, msg.sequence) {
                let expected = next_sequence(previous);
                if msg.sequence != expected {
                    problems.push(format!("{} sequence {} after {} (expected {})", id, msg.sequence, previous, expected));
                }
            }
        }

        for problem in problems {
            self.violation(state.tick, problem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use nalgebra::Vector3;
    use v2v_core::{VehicleClass, VehicleHandle};
    use v2v_env::{ActorId, ActorSnapshot, FrameSnapshot};

    #[test]
    fn test_clean_run_has_no_violations() {
        let config = CoordinatorConfig::default();
        let mut coordinator = V2VCoordinator::new(SimContext::shared(1), config.clone()).unwrap();
        let mut snapshot = FrameSnapshot::new(0.0);
        for i in 1..=5u32 {
            coordinator
                .register(VehicleId(i), VehicleHandle::new(ActorId(i as u64), VehicleClass::PassengerCar))
                .unwrap();
            snapshot.insert(ActorSnapshot::new(
                ActorId(i as u64),
                Vector3::new(i as f64 * 12.0, 0.0, 0.0),
                Vector3::new(if i % 2 == 0 { 10.0 } else { -10.0 }, 0.0, 0.0),
                if i % 2 == 0 { 0.0 } else { 180.0 },
            ));
        }

        let mut checker = InvariantChecker::new(&config);
        for _ in 0..3 {
            coordinator.force_update(&snapshot);
            checker.check(&coordinator);
        }
        assert!(checker.is_clean(), "{:?}", checker.violations());
    }

    #[test]
    fn test_sequence_gap_detected() {
        let config = CoordinatorConfig::default();
        let mut coordinator = V2VCoordinator::new(SimContext::shared(1), config.clone()).unwrap();
        coordinator
            .register(VehicleId(1), VehicleHandle::new(ActorId(1), VehicleClass::PassengerCar))
            .unwrap();
        let snapshot = FrameSnapshot::new(0.0).with_actor(ActorSnapshot::new(
            ActorId(1),
            Vector3::zeros(),
            Vector3::zeros(),
            0.0,
        ));

        let mut checker = InvariantChecker::new(&config);
        coordinator.force_update(&snapshot);
        checker.check(&coordinator);

        // Re-registration restarts the counter; a checker that was not told
        // about the departure sees a gap
        coordinator.unregister(VehicleId(1));
        coordinator
            .register(VehicleId(1), VehicleHandle::new(ActorId(1), VehicleClass::PassengerCar))
            .unwrap();
        coordinator.force_update(&snapshot);
        checker.check(&coordinator);

        assert_eq!(checker.violation_count(), 1);
    }
}
