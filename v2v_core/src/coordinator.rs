//! Network Coordinator - orchestrates one V2V tick.
//!
//! The coordinator is the single writer of the network state. Every accepted
//! tick runs the full pipeline and then swaps in a fresh, immutable
//! [`PublishedState`]:
//!
//! ```text
//! update(snapshot)
//!   │
//!   ├─ RateLimiter ──reject──► no-op (previous state stays published)
//!   │
//!   ├─ Registry snapshot (one consistent view)
//!   ├─ Message Builder   (best effort per vehicle)
//!   ├─ Neighbor Discovery
//!   ├─ Threat Assessor   (optional stage)
//!   ├─ Sharing Policy    (optional stage)
//!   ├─ Statistics
//!   └─ publish + mark limiter
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use v2v_core::{CoordinatorConfig, V2VCoordinator, VehicleHandle, VehicleClass};
//! use v2v_env::{TokioContext, VehicleId, ActorId};
//!
//! let mut coordinator = V2VCoordinator::new(TokioContext::shared(), CoordinatorConfig::default())?;
//! coordinator.register(VehicleId(1), VehicleHandle::new(ActorId(17), VehicleClass::PassengerCar))?;
//!
//! loop {
//!     world.tick();
//!     coordinator.update(&world.snapshot());
//! }
//! ```

use crate::builder::{build_message, BuildInputs, MotionSample, VehicleHandle};
use crate::config::CoordinatorConfig;
use crate::discovery::{discover_with, NeighborRecord, NeighborTable};
use crate::error::CoordinatorError;
use crate::messages::{next_sequence, PathPoint, SafetyMessage};
use crate::rate_limiter::RateLimiter;
use crate::registry::{Registry, RegistryEntry};
use crate::sharing::CooperativeShare;
use crate::stats::NetworkStats;
use crate::threat::{assess, sort_by_severity, ThreatLevel, ThreatRecord};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use v2v_env::{V2VContext, VehicleId, WorldSnapshot};

/// Result of one `update()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The tick ran and a new state was published
    Accepted {
        /// 1-based accepted tick number
        tick: u64,
        /// Vehicles that produced a message this tick
        participants: usize,
    },
    /// Absorbed by the rate limiter; nothing changed
    Rejected,
}

impl UpdateOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UpdateOutcome::Accepted { .. })
    }
}

/// A registered vehicle that was dropped from one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFailure {
    pub vehicle_id: VehicleId,
    pub reason: String,
}

/// Everything one accepted tick produced.
///
/// Immutable once published; the next accepted tick replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublishedState {
    /// Accepted tick number (0 before the first accepted tick)
    pub tick: u64,

    /// Snapshot time of this tick (seconds)
    pub timestamp: f64,

    /// One message per participant
    pub messages: BTreeMap<VehicleId, SafetyMessage>,

    /// Neighbor lists, nearest first
    pub neighbors: NeighborTable,

    /// Threats per subject, most severe first
    pub threats: BTreeMap<VehicleId, Vec<ThreatRecord>>,

    /// Triggered cooperative shares (one per ordered pair)
    pub shares: Vec<CooperativeShare>,

    /// Registered vehicles left out of this tick
    pub failures: Vec<TickFailure>,

    /// Participants whose message was skipped by discovery
    pub malformed: Vec<VehicleId>,
}

impl PublishedState {
    /// Drops every trace of `id`.
    fn remove_vehicle(&mut self, id: VehicleId) {
        self.messages.remove(&id);
        self.neighbors.remove(&id);
        for list in self.neighbors.values_mut() {
            list.retain(|record| record.vehicle_id != id);
        }
        self.threats.remove(&id);
        for list in self.threats.values_mut() {
            list.retain(|record| record.other_id != id);
        }
        self.shares.retain(|share| share.from != id && share.to != id);
        self.failures.retain(|failure| failure.vehicle_id != id);
        self.malformed.retain(|other| *other != id);
    }
}

/// Per-vehicle state carried across ticks.
#[derive(Debug, Clone)]
struct VehicleTrack {
    /// Registration this track belongs to
    epoch: u64,

    /// Sequence number to stamp on the next message
    sequence: u8,

    last_motion: Option<MotionSample>,

    /// Breadcrumbs from earlier ticks, oldest first
    path: VecDeque<PathPoint>,
}

impl VehicleTrack {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            sequence: 0,
            last_motion: None,
            path: VecDeque::new(),
        }
    }

    fn record(&mut self, msg: &SafetyMessage, max_path: usize) {
        self.sequence = next_sequence(self.sequence);

        // A malformed fix never seeds acceleration or becomes a breadcrumb
        if !msg.is_well_formed() {
            if max_path == 0 {
                self.path.clear();
            }
            return;
        }
        self.last_motion = Some(MotionSample {
            speed: msg.speed,
            timestamp: msg.timestamp,
        });

        if max_path == 0 {
            self.path.clear();
            return;
        }
        self.path.push_back(PathPoint {
            x: msg.position.x,
            y: msg.position.y,
            z: msg.position.z,
            timestamp: msg.timestamp,
        });
        while self.path.len() > max_path {
            self.path.pop_front();
        }
    }
}

/// The V2V network coordinator.
///
/// Generic over the clock so the same coordinator runs under a wall clock
/// or a virtual simulation clock.
pub struct V2VCoordinator<Ctx>
where
    Ctx: V2VContext,
{
    /// Environment clock
    context: Arc<Ctx>,

    config: CoordinatorConfig,

    limiter: RateLimiter,

    /// Shared so vehicles can be spawned/destroyed from other threads
    registry: Arc<Registry>,

    tracks: HashMap<VehicleId, VehicleTrack>,

    published: Arc<PublishedState>,

    stats: NetworkStats,
}

impl<Ctx> V2VCoordinator<Ctx>
where
    Ctx: V2VContext,
{
    /// Creates a coordinator.
    ///
    /// # Errors
    /// `CoordinatorError::Config` if the configuration does not validate.
    pub fn new(context: Arc<Ctx>, config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        config.validate()?;
        let limiter = RateLimiter::new(config.update_rate_hz)?;
        let stats = NetworkStats::new(config.update_rate_hz, config.max_range_m);

        info!(
            "V2V coordinator ready: {} Hz, {} m range, threats={}, sharing={}, extended={}",
            config.update_rate_hz,
            config.max_range_m,
            config.stages.threat_assessment,
            config.stages.cooperative_sharing,
            config.stages.extended_data,
        );

        Ok(Self {
            context,
            config,
            limiter,
            registry: Arc::new(Registry::new()),
            tracks: HashMap::new(),
            published: Arc::new(PublishedState::default()),
            stats,
        })
    }

    // ========================================================================
    // MEMBERSHIP
    // ========================================================================

    /// Registers a vehicle for V2V.
    ///
    /// # Errors
    /// `CoordinatorError::DuplicateId` if the id is taken; existing
    /// participants are unaffected.
    pub fn register(&self, id: VehicleId, handle: VehicleHandle) -> Result<(), CoordinatorError> {
        self.registry.register(id, handle)
    }

    /// Removes a vehicle. Unknown ids are ignored.
    ///
    /// The vehicle disappears from the published state immediately.
    pub fn unregister(&mut self, id: VehicleId) {
        self.registry.unregister(id);
        self.tracks.remove(&id);
        if self.published.messages.contains_key(&id) || self.published.neighbors.contains_key(&id) {
            Arc::make_mut(&mut self.published).remove_vehicle(id);
        }
    }

    /// Opts a vehicle into cooperative sharing. Returns false for unknown ids.
    pub fn enable_bidirectional_sharing(&self, id: VehicleId) -> bool {
        let known = self.registry.set_sharing(id, true);
        if known {
            debug!("Cooperative sharing enabled for {}", id);
        }
        known
    }

    pub fn disable_bidirectional_sharing(&self, id: VehicleId) -> bool {
        self.registry.set_sharing(id, false)
    }

    /// Handle for registering vehicles from other threads.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Advances the network by at most one tick.
    ///
    /// `snapshot` must have been taken right after the simulation tick
    /// advanced. Calls faster than the configured rate are absorbed.
    /// Per-vehicle problems never surface here; see [`PublishedState::failures`].
    pub fn update<S>(&mut self, snapshot: &S) -> UpdateOutcome
    where
        S: WorldSnapshot + ?Sized,
    {
        let now = self.context.now();
        if !self.limiter.should_update(now) {
            self.stats.rejected_updates += 1;
            trace!("V2V update rejected by rate limiter at {:?}", now);
            return UpdateOutcome::Rejected;
        }
        self.run_tick(snapshot, now)
    }

    /// Runs a tick regardless of the rate limiter. The limiter is still marked.
    pub fn force_update<S>(&mut self, snapshot: &S) -> UpdateOutcome
    where
        S: WorldSnapshot + ?Sized,
    {
        let now = self.context.now();
        self.run_tick(snapshot, now)
    }

    fn run_tick<S>(&mut self, snapshot: &S, now: Duration) -> UpdateOutcome
    where
        S: WorldSnapshot + ?Sized,
    {
        let tick = self.stats.accepted_ticks + 1;
        let timestamp = snapshot.timestamp();
        let entries = self.registry.snapshot();

        // Tracks of vehicles that left (or re-registered) start over
        self.tracks
            .retain(|id, track| entries.get(id).map(|entry| entry.epoch == track.epoch).unwrap_or(false));

        let (messages, failures) = self.build_messages(&entries, snapshot, tick);

        let discovery = discover_with(
            &messages,
            self.config.max_range_m,
            self.config.spatial_index,
            self.config.grid_threshold,
        );
        for id in &discovery.malformed {
            warn!("Vehicle {} sent a malformed message on tick {}; skipped for discovery", id, tick);
        }

        let mut threats: BTreeMap<VehicleId, Vec<ThreatRecord>> = BTreeMap::new();
        if self.config.stages.threat_assessment {
            for (subject_id, neighbors) in &discovery.neighbors {
                let Some(subject) = messages.get(subject_id) else {
                    continue;
                };
                let mut records: Vec<ThreatRecord> = neighbors
                    .iter()
                    .map(|neighbor| assess(subject, &neighbor.peer, neighbor.distance))
                    .collect();
                sort_by_severity(&mut records);
                threats.insert(*subject_id, records);
            }
        }

        let mut shares = Vec::new();
        if self.config.stages.cooperative_sharing {
            for (subject_id, records) in &threats {
                let enabled = entries
                    .get(subject_id)
                    .map(|entry| entry.sharing_enabled)
                    .unwrap_or(false);
                shares.extend(
                    records
                        .iter()
                        .filter(|record| self.config.sharing.should_share(record, enabled))
                        .map(CooperativeShare::from_record),
                );
            }
        }

        // Statistics
        self.stats.accepted_ticks = tick;
        self.stats.total_messages_sent += messages.len() as u64;
        self.stats.average_neighbor_count = discovery.average_neighbor_count();
        self.stats.max_neighbor_count = discovery.max_neighbor_count();
        self.stats.cooperative_share_count += shares.len() as u64;
        self.stats.snapshot_failures += failures.len() as u64;
        self.stats.malformed_skips += discovery.malformed.len() as u64;

        let participants = messages.len();
        let high_threats = threats
            .values()
            .flatten()
            .filter(|record| record.threat_level >= ThreatLevel::Warning)
            .count();
        debug!(
            "V2V tick {}: {} participants, {:.2} avg neighbors, {} high threats, {} shares, {} failures",
            tick,
            participants,
            self.stats.average_neighbor_count,
            high_threats,
            shares.len(),
            failures.len(),
        );

        self.published = Arc::new(PublishedState {
            tick,
            timestamp,
            messages,
            neighbors: discovery.neighbors,
            threats,
            shares,
            failures,
            malformed: discovery.malformed,
        });
        self.limiter.mark_updated(now);

        UpdateOutcome::Accepted { tick, participants }
    }

    /// Builds this tick's messages, best effort per vehicle.
    fn build_messages<S>(
        &mut self,
        entries: &BTreeMap<VehicleId, RegistryEntry>,
        snapshot: &S,
        tick: u64,
    ) -> (BTreeMap<VehicleId, SafetyMessage>, Vec<TickFailure>)
    where
        S: WorldSnapshot + ?Sized,
    {
        let extended = self.config.stages.extended_data;
        let max_path = self.config.path_history_len;

        let mut messages = BTreeMap::new();
        let mut failures = Vec::new();

        for (id, entry) in entries {
            let track = self
                .tracks
                .entry(*id)
                .or_insert_with(|| VehicleTrack::new(entry.epoch));

            let inputs = BuildInputs {
                previous: track.last_motion,
                path_history: track.path.make_contiguous(),
                extended,
            };

            match build_message(&entry.handle, *id, track.sequence, snapshot, inputs) {
                Ok(msg) => {
                    track.record(&msg, max_path);
                    messages.insert(*id, msg);
                }
                Err(source) => {
                    let err = CoordinatorError::Snapshot { vehicle_id: *id, source };
                    warn!("{}; excluded from tick {}", err, tick);
                    failures.push(TickFailure {
                        vehicle_id: *id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        (messages, failures)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Peer messages of `id`'s neighbors, nearest first.
    pub fn get_neighbors(&self, id: VehicleId) -> Vec<SafetyMessage> {
        self.neighbor_records(id)
            .into_iter()
            .map(|record| record.peer)
            .collect()
    }

    /// Full neighbor records (with distance and relative speed), nearest first.
    pub fn neighbor_records(&self, id: VehicleId) -> Vec<NeighborRecord> {
        if !self.registry.contains(id) {
            return Vec::new();
        }
        self.published
            .neighbors
            .get(&id)
            .map(|list| {
                list.iter()
                    .filter(|record| self.registry.contains(record.vehicle_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Threats with `id` as subject, most severe first.
    pub fn get_threats(&self, id: VehicleId) -> Vec<ThreatRecord> {
        if !self.registry.contains(id) {
            return Vec::new();
        }
        self.published
            .threats
            .get(&id)
            .map(|list| {
                list.iter()
                    .filter(|record| self.registry.contains(record.other_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The vehicle's message from the last accepted tick.
    pub fn get_message(&self, id: VehicleId) -> Option<SafetyMessage> {
        if !self.registry.contains(id) {
            return None;
        }
        self.published.messages.get(&id).cloned()
    }

    /// All messages from the last accepted tick, by ascending id.
    pub fn all_messages(&self) -> Vec<SafetyMessage> {
        self.published
            .messages
            .iter()
            .filter(|(id, _)| self.registry.contains(**id))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Distance between two vehicles as of the last accepted tick.
    pub fn get_distance(&self, a: VehicleId, b: VehicleId) -> Option<f64> {
        let first = self.get_message(a)?;
        let second = self.get_message(b)?;
        if !(first.is_well_formed() && second.is_well_formed()) {
            return None;
        }
        Some(first.distance_to(&second))
    }

    /// Vehicles that received `id`'s sensor data on the last accepted tick.
    pub fn share_recipients(&self, id: VehicleId) -> Vec<VehicleId> {
        self.published
            .shares
            .iter()
            .filter(|share| share.from == id)
            .filter(|share| self.registry.contains(share.from) && self.registry.contains(share.to))
            .map(|share| share.to)
            .collect()
    }

    /// Current statistics. `participant_count` is the registered fleet size.
    pub fn get_network_stats(&self) -> NetworkStats {
        NetworkStats {
            participant_count: self.registry.len(),
            ..self.stats.clone()
        }
    }

    /// The last published state, shared read-only.
    ///
    /// Vehicles unregistered through a shared registry handle since that tick
    /// are filtered out of the returned copy.
    pub fn published(&self) -> Arc<PublishedState> {
        let departed: BTreeSet<VehicleId> = self
            .published
            .messages
            .keys()
            .chain(self.published.neighbors.keys())
            .chain(self.published.threats.keys())
            .chain(self.published.shares.iter().flat_map(|share| [&share.from, &share.to]))
            .chain(self.published.failures.iter().map(|failure| &failure.vehicle_id))
            .chain(self.published.malformed.iter())
            .filter(|id| !self.registry.contains(**id))
            .copied()
            .collect();
        if departed.is_empty() {
            return Arc::clone(&self.published);
        }

        let mut view = PublishedState::clone(&self.published);
        for id in departed {
            view.remove_vehicle(id);
        }
        Arc::new(view)
    }

    /// One-line console summary for a vehicle.
    pub fn status_line(&self, id: VehicleId) -> Option<String> {
        let msg = self.get_message(id)?;
        let neighbors = self.neighbor_records(id).len();
        let high_threats = self
            .get_threats(id)
            .iter()
            .filter(|record| record.threat_level >= ThreatLevel::Warning)
            .count();

        Some(format!(
            "{} [{}] speed={:.1} m/s heading={:.0}° neighbors={} high_threats={} seq={}",
            id,
            msg.vehicle_class.name(),
            msg.speed,
            msg.heading,
            neighbors,
            high_threats,
            msg.sequence,
        ))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    /// Number of accepted ticks so far.
    pub fn tick_count(&self) -> u64 {
        self.stats.accepted_ticks
    }
}
