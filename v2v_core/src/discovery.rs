//! The Neighbor Discovery Engine
//!
//! Builds the symmetric "within communication range" relation over the
//! current set of safety messages:
//! - Every unordered pair is evaluated exactly once and, when in range,
//!   recorded on *both* sides with the same distance
//! - Range is inclusive (`distance <= max_range`)
//! - Neighbor lists are ordered by distance, ties by vehicle id
//!
//! For large fleets a uniform grid (cell edge = range) prunes candidate
//! pairs. It changes cost, never the result.

use crate::messages::SafetyMessage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use v2v_env::VehicleId;

/// Grid cells are padded so float rounding in `floor(x / cell)` can never
/// push an in-range pair two cells apart.
const GRID_CELL_PADDING: f64 = 1.01;

/// One neighbor of a subject vehicle, valid for a single accepted tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// The neighbor
    pub vehicle_id: VehicleId,

    /// Euclidean distance between the two positions (meters)
    pub distance: f64,

    /// |peer speed - subject speed| (m/s)
    pub relative_speed: f64,

    /// The neighbor's message for this tick
    pub peer: SafetyMessage,
}

/// Neighbor lists keyed by subject.
pub type NeighborTable = BTreeMap<VehicleId, Vec<NeighborRecord>>;

/// Candidate-pair strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialIndex {
    /// Brute force for small fleets, grid above the configured threshold
    #[default]
    Auto,
    /// O(n²) all-pairs join
    BruteForce,
    /// Uniform grid with cell edge = range
    Grid,
}

/// Output of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Every participant has an entry, possibly empty
    pub neighbors: NeighborTable,

    /// Participants whose messages were skipped for non-finite data
    pub malformed: Vec<VehicleId>,

    /// Distances actually computed
    pub pairs_evaluated: usize,
}

impl Discovery {
    pub fn neighbor_count(&self, id: VehicleId) -> usize {
        self.neighbors.get(&id).map(Vec::len).unwrap_or(0)
    }

    /// Mean neighbor count over all participants (0 when empty).
    pub fn average_neighbor_count(&self) -> f64 {
        if self.neighbors.is_empty() {
            return 0.0;
        }
        let total: usize = self.neighbors.values().map(Vec::len).sum();
        total as f64 / self.neighbors.len() as f64
    }

    pub fn max_neighbor_count(&self) -> usize {
        self.neighbors.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// Runs the O(n²) all-pairs discovery.
///
/// # Arguments
/// * `messages` - One message per participant, keyed by sender
/// * `max_range` - Communication range in meters (inclusive)
pub fn discover(messages: &BTreeMap<VehicleId, SafetyMessage>, max_range: f64) -> Discovery {
    discover_with(messages, max_range, SpatialIndex::BruteForce, usize::MAX)
}

/// Runs discovery with an explicit candidate strategy.
///
/// `grid_threshold` only matters for `SpatialIndex::Auto`.
pub fn discover_with(
    messages: &BTreeMap<VehicleId, SafetyMessage>,
    max_range: f64,
    index: SpatialIndex,
    grid_threshold: usize,
) -> Discovery {
    let mut discovery = Discovery {
        neighbors: messages.keys().map(|id| (*id, Vec::new())).collect(),
        ..Discovery::default()
    };

    // Malformed senders stay participants but pair with nobody this tick
    let mut valid: Vec<&SafetyMessage> = Vec::with_capacity(messages.len());
    for (id, msg) in messages {
        if msg.is_well_formed() {
            valid.push(msg);
        } else {
            discovery.malformed.push(*id);
        }
    }

    let use_grid = match index {
        SpatialIndex::BruteForce => false,
        SpatialIndex::Grid => true,
        SpatialIndex::Auto => valid.len() > grid_threshold,
    };

    let pairs = if use_grid {
        grid_pairs(&valid, max_range)
    } else {
        all_pairs(&valid)
    };

    for (i, j) in pairs {
        discovery.pairs_evaluated += 1;
        // `valid` is in ascending id order and pairs are (lower, higher), so
        // the distance is computed in the same orientation by both strategies
        let (a, b) = (valid[i], valid[j]);
        let distance = a.distance_to(b);
        if distance <= max_range {
            let relative_speed = (b.speed - a.speed).abs();
            link(&mut discovery.neighbors, a, b, distance, relative_speed);
            link(&mut discovery.neighbors, b, a, distance, relative_speed);
        }
    }

    for list in discovery.neighbors.values_mut() {
        list.sort_by(|x, y| {
            x.distance
                .total_cmp(&y.distance)
                .then_with(|| x.vehicle_id.cmp(&y.vehicle_id))
        });
    }

    discovery
}

fn link(table: &mut NeighborTable, subject: &SafetyMessage, peer: &SafetyMessage, distance: f64, relative_speed: f64) {
    if let Some(list) = table.get_mut(&subject.vehicle_id) {
        list.push(NeighborRecord {
            vehicle_id: peer.vehicle_id,
            distance,
            relative_speed,
            peer: peer.clone(),
        });
    }
}

/// Every unordered index pair (i < j).
fn all_pairs(valid: &[&SafetyMessage]) -> Vec<(usize, usize)> {
    let n = valid.len();
    let mut pairs = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

type CellKey = (i64, i64, i64);

fn cell_of(msg: &SafetyMessage, cell_size: f64) -> CellKey {
    (
        (msg.position.x / cell_size).floor() as i64,
        (msg.position.y / cell_size).floor() as i64,
        (msg.position.z / cell_size).floor() as i64,
    )
}

/// Candidate pairs (i < j) from the 27-cell neighborhood of each cell.
fn grid_pairs(valid: &[&SafetyMessage], max_range: f64) -> Vec<(usize, usize)> {
    let cell_size = max_range * GRID_CELL_PADDING;

    let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (idx, msg) in valid.iter().enumerate() {
        cells.entry(cell_of(msg, cell_size)).or_default().push(idx);
    }

    let mut pairs = Vec::new();
    for (&(cx, cy, cz), members) in &cells {
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                for dz in -1i64..=1 {
                    let key = (cx.saturating_add(dx), cy.saturating_add(dy), cz.saturating_add(dz));
                    let Some(others) = cells.get(&key) else {
                        continue;
                    };
                    for &i in members {
                        for &j in others {
                            // Each unordered pair is emitted once, from its lower index
                            if i < j {
                                pairs.push((i, j));
                            }
                        }
                    }
                }
            }
        }
    }

    // Keep evaluation order identical to the brute-force join
    pairs.sort_unstable();
    pairs.dedup();
    pairs
}
