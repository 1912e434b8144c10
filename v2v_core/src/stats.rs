//! Network statistics.

use serde::{Deserialize, Serialize};

/// Counters published by the coordinator.
///
/// The neighbor figures describe the last accepted tick; the remaining
/// counters accumulate over the coordinator's lifetime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Registered vehicles
    pub participant_count: usize,

    /// Safety messages built across all accepted ticks
    pub total_messages_sent: u64,

    /// Mean neighbor list length over the last tick's participants
    pub average_neighbor_count: f64,

    /// Longest neighbor list on the last accepted tick
    pub max_neighbor_count: usize,

    /// Ordered (from, to) pairs that triggered cooperative sharing
    pub cooperative_share_count: u64,

    pub configured_rate_hz: f64,
    pub configured_range_m: f64,

    /// Ticks that passed the rate limiter (including forced ones)
    pub accepted_ticks: u64,

    /// `update()` calls absorbed by the rate limiter
    pub rejected_updates: u64,

    /// Per-vehicle snapshot lookups that failed
    pub snapshot_failures: u64,

    /// Messages skipped by discovery for non-finite data
    pub malformed_skips: u64,
}

impl NetworkStats {
    pub fn new(configured_rate_hz: f64, configured_range_m: f64) -> Self {
        Self {
            configured_rate_hz,
            configured_range_m,
            ..Self::default()
        }
    }
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "participants={} msgs={} avg_neighbors={:.2} max_neighbors={} shares={} ticks={}/{}",
            self.participant_count,
            self.total_messages_sent,
            self.average_neighbor_count,
            self.max_neighbor_count,
            self.cooperative_share_count,
            self.accepted_ticks,
            self.accepted_ticks + self.rejected_updates,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_carries_configuration() {
        let stats = NetworkStats::new(2.0, 150.0);
        assert_eq!(stats.configured_rate_hz, 2.0);
        assert_eq!(stats.configured_range_m, 150.0);
        assert_eq!(stats.total_messages_sent, 0);
    }

    #[test]
    fn test_display_summary() {
        let stats = NetworkStats {
            participant_count: 3,
            accepted_ticks: 2,
            rejected_updates: 5,
            ..NetworkStats::new(2.0, 150.0)
        };
        let line = stats.to_string();
        assert!(line.contains("participants=3"));
        assert!(line.contains("ticks=2/7"));
    }
}
