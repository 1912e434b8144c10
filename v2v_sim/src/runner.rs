//! Scenario runner - drives traffic scenarios through the coordinator and
//! judges the outcome.
//!
//! Every scenario runs the [`InvariantChecker`] after each accepted tick;
//! any violation fails the run regardless of the scenario's own criteria.

use crate::error::SimError;
use crate::exporter::{SimEvent, SimExport, SimFrame};
use crate::invariants::InvariantChecker;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use v2v_core::{BrakeStatus, CoordinatorConfig, ThreatLevel, UpdateOutcome, VehicleClass};
use v2v_env::VehicleId;

/// RNG stream for spawn layouts.
const LAYOUT_STREAM: u64 = 2;

/// Deceleration used for hard-braking events (m/s²).
const HARD_BRAKE_DECEL: f64 = 8.0;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total simulation ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Registered vehicles at the end
    pub final_vehicle_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    pub accepted_ticks: u64,
    pub rejected_updates: u64,
    pub messages_sent: u64,
    pub max_neighbor_count: usize,
    pub max_threat_level: ThreatLevel,

    /// Critical assessments summed over ticks
    pub critical_threats: u64,
    pub cooperative_shares: u64,
    pub snapshot_failures: u64,
    pub malformed_skips: u64,

    /// Messages broadcast with emergency braking status
    pub emergency_brake_messages: u64,

    /// Sim time of the first Caution-or-worse assessment
    pub first_threat_time: Option<f64>,
    pub invariant_violations: u64,
}

/// A harness action fired before a given simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    /// Actor vanishes, registration stays
    DestroyActor(VehicleId),
    Unregister(VehicleId),
    /// Next consumed snapshot carries a NaN position
    CorruptPosition(VehicleId),
    Brake(VehicleId, f64),
}

#[derive(Debug, Clone, Copy)]
struct ScriptedEvent {
    at_tick: u64,
    action: Action,
}

/// Runs traffic scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of vehicles for size-independent scenarios
    num_vehicles: usize,

    /// Simulation step rate in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    coordinator_config: CoordinatorConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_vehicles: usize) -> Self {
        Self {
            seed,
            num_vehicles: num_vehicles.max(2),
            tick_rate_hz: 20,
            max_duration_secs: 10.0,
            coordinator_config: CoordinatorConfig::default(),
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the coordinator configuration under test.
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator_config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        let mut execution = match self.prepare(scenario) {
            Ok(execution) => execution,
            Err(e) => return self.setup_failure(scenario, e),
        };
        while execution.step(None) {}
        execution.finish()
    }

    fn setup_failure(&self, scenario: ScenarioId, error: SimError) -> ScenarioResult {
        warn!("Scenario {} could not start: {}", scenario.name(), error);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            final_vehicle_count: 0,
            failure_reason: Some(error.to_string()),
            metrics: ScenarioMetrics::default(),
        }
    }

    /// Builds the world for a scenario without running it.
    ///
    /// Callers that need per-tick control (export, realtime pacing) drive
    /// the returned execution themselves.
    pub fn prepare(&self, scenario: ScenarioId) -> Result<ScenarioExecution, SimError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        if scenario.is_stress() {
            warn!("Stress scenario: {}", scenario.description());
        }

        let tick_rate_hz = match scenario {
            ScenarioId::RapidFire => 100,
            _ => self.tick_rate_hz,
        };
        let mut coordinator = self.coordinator_config.clone();
        if scenario == ScenarioId::Intersection {
            // Crossing traffic must stay in range for the whole approach
            coordinator.max_range_m = coordinator.max_range_m.max(100.0);
        }

        let mut world = SimWorld::new(SimConfig {
            seed: self.seed,
            tick_rate_hz,
            sensor_noise_std: 0.0,
            coordinator,
        })?;

        let duration = match scenario {
            ScenarioId::HeadOn => self.max_duration_secs.max(8.0),
            ScenarioId::Intersection => self.max_duration_secs.max(5.0),
            ScenarioId::Platoon => self.max_duration_secs.max(4.0),
            ScenarioId::Dropout => self.max_duration_secs.max(3.0),
            ScenarioId::DenseGrid => self.max_duration_secs.min(5.0),
            ScenarioId::RapidFire => self.max_duration_secs.min(10.0),
            ScenarioId::Highway => self.max_duration_secs,
        };
        let target_ticks = ((duration * f64::from(tick_rate_hz)).round() as u64).max(1);

        let events = match scenario {
            ScenarioId::Highway => self.setup_highway(&mut world)?,
            ScenarioId::Intersection => self.setup_intersection(&mut world)?,
            ScenarioId::HeadOn => self.setup_head_on(&mut world)?,
            ScenarioId::Platoon => self.setup_platoon(&mut world, target_ticks)?,
            ScenarioId::Dropout => self.setup_dropout(&mut world, target_ticks)?,
            ScenarioId::DenseGrid => self.setup_dense_grid(&mut world)?,
            ScenarioId::RapidFire => self.setup_rapid_fire(&mut world)?,
        };

        info!(
            "  Config: {} vehicles, {}Hz sim, {}Hz V2V, {:.0}m range, {} ticks",
            world.vehicle_count(),
            tick_rate_hz,
            world.config.coordinator.update_rate_hz,
            world.config.coordinator.max_range_m,
            target_ticks
        );

        let checker = InvariantChecker::new(&world.config.coordinator);
        Ok(ScenarioExecution {
            scenario,
            seed: self.seed,
            world,
            events,
            pending_corruption: Vec::new(),
            target_ticks,
            checker,
            metrics: ScenarioMetrics::default(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SCENARIO LAYOUTS
    // ═══════════════════════════════════════════════════════════════════════

    /// V2V-001: three lanes, seeded spacing and speeds.
    fn setup_highway(&self, world: &mut SimWorld) -> Result<Vec<ScriptedEvent>, SimError> {
        let mut rng = world.context().rng(LAYOUT_STREAM);
        for i in 0..self.num_vehicles {
            let lane = (i % 3) as f64 * 3.5;
            let x = (i / 3) as f64 * 60.0 + rng.gen_range(0.0..10.0);
            let speed = rng.gen_range(25.0..33.0);
            let class = if i % 7 == 6 { VehicleClass::Truck } else { VehicleClass::PassengerCar };
            world.spawn_vehicle(Vector3::new(x, lane, 0.0), Vector3::new(speed, 0.0, 0.0), class)?;
        }
        Ok(Vec::new())
    }

    /// V2V-002: one stream heading east, one heading north, meeting at the origin.
    fn setup_intersection(&self, world: &mut SimWorld) -> Result<Vec<ScriptedEvent>, SimError> {
        let per_stream = (self.num_vehicles / 2).max(1);
        for i in 0..per_stream {
            let offset = 60.0 + 40.0 * i as f64;
            world.spawn_vehicle(Vector3::new(-offset, 0.0, 0.0), Vector3::new(15.0, 0.0, 0.0), VehicleClass::PassengerCar)?;
            world.spawn_vehicle(Vector3::new(0.0, -offset, 0.0), Vector3::new(0.0, 15.0, 0.0), VehicleClass::PassengerCar)?;
        }
        world.enable_sharing_all();
        Ok(Vec::new())
    }

    /// V2V-003: 200 m apart, 15 m/s each, same lane.
    fn setup_head_on(&self, world: &mut SimWorld) -> Result<Vec<ScriptedEvent>, SimError> {
        world.spawn_vehicle(Vector3::zeros(), Vector3::new(15.0, 0.0, 0.0), VehicleClass::PassengerCar)?;
        world.spawn_vehicle(Vector3::new(200.0, 0.0, 0.0), Vector3::new(-15.0, 0.0, 0.0), VehicleClass::PassengerCar)?;
        world.enable_sharing_all();
        Ok(Vec::new())
    }

    /// V2V-004: 20 m gaps at 25 m/s; the leader brakes half way through.
    fn setup_platoon(&self, world: &mut SimWorld, target_ticks: u64) -> Result<Vec<ScriptedEvent>, SimError> {
        let n = self.num_vehicles.min(8);
        let mut leader = None;
        for i in 0..n {
            let x = (n - 1 - i) as f64 * 20.0;
            let id = world.spawn_vehicle(Vector3::new(x, 0.0, 0.0), Vector3::new(25.0, 0.0, 0.0), VehicleClass::PassengerCar)?;
            leader.get_or_insert(id);
        }
        Ok(leader
            .map(|id| ScriptedEvent {
                at_tick: target_ticks / 2,
                action: Action::Brake(id, HARD_BRAKE_DECEL),
            })
            .into_iter()
            .collect())
    }

    /// V2V-005: one actor vanishes at 1/3, is unregistered at 2/3; another
    /// reports a corrupted position once.
    fn setup_dropout(&self, world: &mut SimWorld, target_ticks: u64) -> Result<Vec<ScriptedEvent>, SimError> {
        let n = self.num_vehicles.max(3);
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let id = world.spawn_vehicle(
                Vector3::new(i as f64 * 15.0, 0.0, 0.0),
                Vector3::new(10.0, 0.0, 0.0),
                VehicleClass::PassengerCar,
            )?;
            ids.push(id);
        }
        let lost = ids[1];
        let corrupted = ids[2];
        Ok(vec![
            ScriptedEvent {
                at_tick: target_ticks / 6,
                action: Action::CorruptPosition(corrupted),
            },
            ScriptedEvent {
                at_tick: target_ticks / 3,
                action: Action::DestroyActor(lost),
            },
            ScriptedEvent {
                at_tick: target_ticks * 2 / 3,
                action: Action::Unregister(lost),
            },
        ])
    }

    /// V2V-006: 200 stationary vehicles on a jittered 15 m grid.
    fn setup_dense_grid(&self, world: &mut SimWorld) -> Result<Vec<ScriptedEvent>, SimError> {
        let mut rng = world.context().rng(LAYOUT_STREAM);
        for row in 0..10 {
            for col in 0..20 {
                let position = Vector3::new(
                    col as f64 * 15.0 + rng.gen_range(-2.0..2.0),
                    row as f64 * 15.0 + rng.gen_range(-2.0..2.0),
                    0.0,
                );
                world.spawn_vehicle(position, Vector3::zeros(), VehicleClass::PassengerCar)?;
            }
        }
        Ok(Vec::new())
    }

    /// V2V-007: ordinary traffic, but the host loop runs at 100 Hz.
    fn setup_rapid_fire(&self, world: &mut SimWorld) -> Result<Vec<ScriptedEvent>, SimError> {
        for i in 0..self.num_vehicles {
            world.spawn_vehicle(
                Vector3::new(i as f64 * 30.0, 0.0, 0.0),
                Vector3::new(20.0 + (i % 3) as f64, 0.0, 0.0),
                VehicleClass::PassengerCar,
            )?;
        }
        Ok(Vec::new())
    }
}

/// A scenario in progress.
pub struct ScenarioExecution {
    scenario: ScenarioId,
    seed: u64,
    world: SimWorld,
    events: Vec<ScriptedEvent>,

    /// Corruptions re-armed every tick until an update consumes one
    pending_corruption: Vec<VehicleId>,
    target_ticks: u64,
    checker: InvariantChecker,
    metrics: ScenarioMetrics,
}

impl ScenarioExecution {
    pub fn scenario(&self) -> ScenarioId {
        self.scenario
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Wall-clock length of one step when paced in real time.
    pub fn tick_interval(&self) -> Duration {
        self.world.tick_interval()
    }

    /// Executes one simulation tick. Returns false once the run is over.
    pub fn step(&mut self, export: Option<&mut SimExport>) -> bool {
        let tick = self.world.tick_count();
        if tick >= self.target_ticks {
            return false;
        }

        let fired = self.apply_events(tick);
        for id in &self.pending_corruption {
            self.world.corrupt_position(*id);
        }

        let outcome = self.world.tick();
        if let UpdateOutcome::Accepted { .. } = outcome {
            self.pending_corruption.clear();
            self.checker.check(self.world.coordinator());
            self.observe();

            if let Some(export) = export {
                let state = self.world.coordinator().published();
                export.add_frame(SimFrame::from_state(self.world.time(), &state, fired));
            }
        }

        if self.world.tick_count() % 100 == 0 {
            debug!(
                "  t={:.1}s | vehicles={} | {}",
                self.world.time(),
                self.world.vehicle_count(),
                self.world.coordinator().get_network_stats()
            );
        }
        true
    }

    fn apply_events(&mut self, tick: u64) -> Vec<SimEvent> {
        let mut fired = Vec::new();
        let due: Vec<Action> = self
            .events
            .iter()
            .filter(|e| e.at_tick == tick)
            .map(|e| e.action)
            .collect();

        for action in due {
            match action {
                Action::DestroyActor(id) => {
                    self.world.destroy_actor(id);
                    info!("  t={:.2}s: actor of {} destroyed", self.world.time(), id);
                    fired.push(SimEvent::warning(format!("actor of {} destroyed", id)));
                }
                Action::Unregister(id) => {
                    self.world.remove_vehicle(id);
                    self.checker.forget(id);
                    info!("  t={:.2}s: {} unregistered", self.world.time(), id);
                    fired.push(SimEvent::info(format!("{} unregistered", id)));
                }
                Action::CorruptPosition(id) => {
                    self.pending_corruption.push(id);
                    fired.push(SimEvent::warning(format!("{} position corrupted", id)));
                }
                Action::Brake(id, decel) => {
                    self.world.brake(id, decel);
                    info!("  t={:.2}s: {} brakes at {:.1} m/s²", self.world.time(), id, decel);
                    fired.push(SimEvent::info(format!("{} brakes hard", id)));
                }
            }
        }
        fired
    }

    /// Folds the freshly published state into the metrics.
    fn observe(&mut self) {
        let state = self.world.coordinator().published();
        let time = self.world.time();

        for list in state.neighbors.values() {
            self.metrics.max_neighbor_count = self.metrics.max_neighbor_count.max(list.len());
        }
        for record in state.threats.values().flatten() {
            self.metrics.max_threat_level = self.metrics.max_threat_level.max(record.threat_level);
            if record.threat_level == ThreatLevel::Critical {
                self.metrics.critical_threats += 1;
            }
            if record.threat_level >= ThreatLevel::Caution && self.metrics.first_threat_time.is_none() {
                self.metrics.first_threat_time = Some(time);
            }
        }
        self.metrics.emergency_brake_messages += state
            .messages
            .values()
            .filter(|msg| msg.brake_status == BrakeStatus::Emergency)
            .count() as u64;
    }

    /// Time at which the scripted brake fires, if any.
    fn brake_time(&self) -> Option<f64> {
        let interval = self.tick_interval().as_secs_f64();
        self.events.iter().find_map(|e| match e.action {
            Action::Brake(..) => Some(e.at_tick as f64 * interval),
            _ => None,
        })
    }

    /// Judges the run and produces the result.
    pub fn finish(mut self) -> ScenarioResult {
        let stats = self.world.coordinator().get_network_stats();
        self.metrics.accepted_ticks = stats.accepted_ticks;
        self.metrics.rejected_updates = stats.rejected_updates;
        self.metrics.messages_sent = stats.total_messages_sent;
        self.metrics.cooperative_shares = stats.cooperative_share_count;
        self.metrics.snapshot_failures = stats.snapshot_failures;
        self.metrics.malformed_skips = stats.malformed_skips;
        self.metrics.invariant_violations = self.checker.violation_count();

        let verdict = if self.checker.is_clean() {
            self.evaluate()
        } else {
            Err(format!(
                "{} invariant violations, first: {}",
                self.checker.violation_count(),
                self.checker.violations().first().map(String::as_str).unwrap_or("?")
            ))
        };
        let passed = verdict.is_ok();

        let m = &self.metrics;
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  {} RESULTS:", self.scenario.name().to_uppercase());
        info!("    Accepted ticks:  {} ({} rejected)", m.accepted_ticks, m.rejected_updates);
        info!("    Messages:        {}", m.messages_sent);
        info!("    Max neighbors:   {}", m.max_neighbor_count);
        info!("    Worst threat:    {}", m.max_threat_level);
        info!("    Shares:          {}", m.cooperative_shares);
        info!("    Failures:        {} snapshot, {} malformed", m.snapshot_failures, m.malformed_skips);
        info!("    Invariants:      {}", if m.invariant_violations == 0 { "✓" } else { "✗" });
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        ScenarioResult {
            scenario: self.scenario,
            seed: self.seed,
            passed,
            total_ticks: self.world.tick_count(),
            final_time_secs: self.world.time(),
            final_vehicle_count: self.world.vehicle_count(),
            failure_reason: verdict.err(),
            metrics: self.metrics,
        }
    }

    /// Scenario-specific pass criteria.
    fn evaluate(&self) -> Result<(), String> {
        let m = &self.metrics;
        if m.accepted_ticks == 0 {
            return Err("coordinator never accepted an update".to_string());
        }

        match self.scenario {
            ScenarioId::Highway => {
                if m.messages_sent == 0 {
                    return Err("no messages broadcast".to_string());
                }
            }
            ScenarioId::Intersection => {
                if m.max_threat_level < ThreatLevel::Warning {
                    return Err(format!("worst threat {} never reached warning", m.max_threat_level));
                }
                if m.cooperative_shares == 0 {
                    return Err("crossing traffic triggered no cooperative shares".to_string());
                }
            }
            ScenarioId::HeadOn => {
                if m.critical_threats == 0 {
                    return Err(format!("head-on approach peaked at {}", m.max_threat_level));
                }
            }
            ScenarioId::Platoon => {
                let brake_time = self.brake_time().unwrap_or(0.0);
                match m.first_threat_time {
                    None => return Err("leader braking raised no threat".to_string()),
                    Some(t) if t < brake_time => {
                        return Err(format!("threat at t={:.2}s before the brake at t={:.2}s", t, brake_time))
                    }
                    Some(_) => {}
                }
                if m.emergency_brake_messages == 0 {
                    return Err("no message carried emergency braking".to_string());
                }
            }
            ScenarioId::Dropout => {
                if m.snapshot_failures == 0 {
                    return Err("destroyed actor caused no snapshot failure".to_string());
                }
                if m.malformed_skips == 0 {
                    return Err("corrupted position was not skipped".to_string());
                }
            }
            ScenarioId::DenseGrid => {
                if m.max_neighbor_count == 0 {
                    return Err("dense grid produced no neighbors".to_string());
                }
            }
            ScenarioId::RapidFire => {
                let expected = self.expected_accepted_ticks();
                if m.accepted_ticks.abs_diff(expected) > 1 {
                    return Err(format!("{} accepted ticks, expected {}", m.accepted_ticks, expected));
                }
                if m.rejected_updates == 0 {
                    return Err("rate limiter rejected nothing".to_string());
                }
            }
        }
        Ok(())
    }

    /// Accepted ticks for a rate-limited run: the first tick, then one per
    /// broadcast interval.
    fn expected_accepted_ticks(&self) -> u64 {
        let tick_ns = self.tick_interval().as_nanos();
        let interval_ns = Duration::try_from_secs_f64(1.0 / self.world.config.coordinator.update_rate_hz)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        if self.target_ticks == 0 || interval_ns == 0 {
            return 0;
        }
        let span_ns = u128::from(self.target_ticks - 1) * tick_ns;
        u64::try_from(span_ns / interval_ns).unwrap_or(u64::MAX) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_highway_scenario() {
        let result = ScenarioRunner::new(42, 9).with_duration(3.0).run(ScenarioId::Highway);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.final_vehicle_count, 9);
        assert!(result.metrics.max_neighbor_count > 0);
    }

    #[test]
    fn test_intersection_scenario() {
        let result = ScenarioRunner::new(42, 4).with_duration(1.0).run(ScenarioId::Intersection);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.cooperative_shares > 0);
    }

    #[test]
    fn test_head_on_scenario() {
        let result = ScenarioRunner::new(42, 2).with_duration(1.0).run(ScenarioId::HeadOn);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.max_threat_level, ThreatLevel::Critical);
    }

    #[test]
    fn test_platoon_scenario() {
        let result = ScenarioRunner::new(42, 5).with_duration(4.0).run(ScenarioId::Platoon);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.first_threat_time.unwrap_or(0.0) >= 2.0);
    }

    #[test]
    fn test_dropout_scenario() {
        let result = ScenarioRunner::new(42, 6).with_duration(3.0).run(ScenarioId::Dropout);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.final_vehicle_count, 5);
        assert!(result.metrics.snapshot_failures > 0);
    }

    #[test]
    fn test_dense_grid_scenario() {
        let result = ScenarioRunner::new(42, 6).with_duration(1.0).run(ScenarioId::DenseGrid);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.final_vehicle_count, 200);
    }

    #[test]
    fn test_rapid_fire_scenario() {
        let result = ScenarioRunner::new(42, 6).with_duration(2.0).run(ScenarioId::RapidFire);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 200);
        assert_eq!(result.metrics.accepted_ticks, 4);
        assert_eq!(result.metrics.rejected_updates, 196);
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let a = ScenarioRunner::new(7, 9).with_duration(2.0).run(ScenarioId::Highway);
        let b = ScenarioRunner::new(7, 9).with_duration(2.0).run(ScenarioId::Highway);

        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.total_ticks, b.total_ticks);
    }

    #[test]
    fn test_export_records_accepted_ticks() {
        let mut execution = ScenarioRunner::new(42, 2)
            .with_duration(1.0)
            .prepare(ScenarioId::HeadOn)
            .unwrap();
        let mut export = SimExport::new("head_on", 42);
        while execution.step(Some(&mut export)) {}
        let result = execution.finish();

        assert_eq!(export.frames.len() as u64, result.metrics.accepted_ticks);
        assert_eq!(export.frames[0].vehicles.len(), 2);
    }

    #[test]
    fn test_invalid_config_fails_setup() {
        let result = ScenarioRunner::new(42, 4)
            .with_config(CoordinatorConfig::default().with_rate(0.0))
            .run(ScenarioId::Highway);

        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_highway_clean_for_any_seed(seed in any::<u64>(), vehicles in 2usize..15) {
            let result = ScenarioRunner::new(seed, vehicles).with_duration(1.5).run(ScenarioId::Highway);
            prop_assert!(result.passed, "{:?}", result.failure_reason);
            prop_assert_eq!(result.metrics.invariant_violations, 0);
        }
    }
}
