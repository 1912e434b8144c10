//! Coordinator configuration.

use crate::discovery::SpatialIndex;
use crate::error::ConfigError;
use crate::sharing::SharingPolicy;
use serde::{Deserialize, Serialize};

/// Default broadcast rate (Hz) - BSM rate for normal driving.
pub const DEFAULT_UPDATE_RATE_HZ: f64 = 2.0;

/// Default communication range (meters) - medium DSRC range.
pub const DEFAULT_MAX_RANGE_M: f64 = 150.0;

/// Optional stages of the per-tick pipeline.
///
/// With every flag off the coordinator degrades to plain neighbor discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStages {
    /// Run TTC / threat banding over every neighbor pair
    pub threat_assessment: bool,

    /// Apply the cooperative sharing policy (needs threat assessment)
    pub cooperative_sharing: bool,

    /// Attach BSM Part II (path history, lights, emergency flag)
    pub extended_data: bool,
}

impl PipelineStages {
    /// Discovery only.
    pub fn basic() -> Self {
        Self {
            threat_assessment: false,
            cooperative_sharing: false,
            extended_data: false,
        }
    }
}

impl Default for PipelineStages {
    fn default() -> Self {
        Self {
            threat_assessment: true,
            cooperative_sharing: true,
            extended_data: true,
        }
    }
}

/// Configuration for the [`V2VCoordinator`](crate::V2VCoordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum communication range in meters (inclusive)
    pub max_range_m: f64,

    /// Network update frequency in Hz (default 2.0 -> 0.5 s interval)
    pub update_rate_hz: f64,

    /// Enabled pipeline stages
    pub stages: PipelineStages,

    /// Cooperative sharing thresholds
    pub sharing: SharingPolicy,

    /// Maximum breadcrumbs kept per vehicle for Part II
    pub path_history_len: usize,

    /// Neighbor discovery strategy
    pub spatial_index: SpatialIndex,

    /// Participant count above which `SpatialIndex::Auto` switches to the grid
    pub grid_threshold: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_range_m: DEFAULT_MAX_RANGE_M,
            update_rate_hz: DEFAULT_UPDATE_RATE_HZ,
            stages: PipelineStages::default(),
            sharing: SharingPolicy::default(),
            path_history_len: 10,
            spatial_index: SpatialIndex::Auto,
            grid_threshold: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Checks every field; the coordinator refuses to start on error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.update_rate_hz.is_finite() && self.update_rate_hz > 0.0) {
            return Err(ConfigError::InvalidRate(self.update_rate_hz));
        }
        if !(self.max_range_m.is_finite() && self.max_range_m > 0.0) {
            return Err(ConfigError::InvalidRange(self.max_range_m));
        }
        if self.grid_threshold < 2 {
            return Err(ConfigError::InvalidGridThreshold(self.grid_threshold));
        }
        if self.stages.cooperative_sharing && !self.stages.threat_assessment {
            return Err(ConfigError::SharingWithoutThreats);
        }
        self.sharing.validate()
    }

    /// Parses a JSON document (missing fields take defaults) and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style setter for the broadcast rate.
    pub fn with_rate(mut self, hz: f64) -> Self {
        self.update_rate_hz = hz;
        self
    }

    /// Builder-style setter for the communication range.
    pub fn with_range(mut self, meters: f64) -> Self {
        self.max_range_m = meters;
        self
    }

    /// Builder-style setter for the pipeline stages.
    pub fn with_stages(mut self, stages: PipelineStages) -> Self {
        self.stages = stages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threat::ThreatLevel;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_rate_hz, 2.0);
        assert_eq!(config.sharing.distance_threshold_m, 50.0);
        assert_eq!(config.sharing.threat_threshold, ThreatLevel::Caution);
    }

    #[test]
    fn test_invalid_rate_and_range_rejected() {
        let zero_rate = CoordinatorConfig::default().with_rate(0.0);
        assert_eq!(zero_rate.validate(), Err(ConfigError::InvalidRate(0.0)));

        let negative_range = CoordinatorConfig::default().with_range(-5.0);
        assert_eq!(negative_range.validate(), Err(ConfigError::InvalidRange(-5.0)));

        let nan_rate = CoordinatorConfig::default().with_rate(f64::NAN);
        assert!(matches!(nan_rate.validate(), Err(ConfigError::InvalidRate(_))));
    }

    #[test]
    fn test_sharing_requires_threats() {
        let config = CoordinatorConfig::default().with_stages(PipelineStages {
            threat_assessment: false,
            ..PipelineStages::default()
        });
        assert_eq!(config.validate(), Err(ConfigError::SharingWithoutThreats));
        assert!(CoordinatorConfig::default().with_stages(PipelineStages::basic()).validate().is_ok());
    }

    #[test]
    fn test_from_json_with_partial_document() {
        let config = CoordinatorConfig::from_json_str(r#"{ "max_range_m": 50.0, "spatial_index": "grid" }"#).unwrap();
        assert_eq!(config.max_range_m, 50.0);
        assert_eq!(config.update_rate_hz, DEFAULT_UPDATE_RATE_HZ);
        assert_eq!(config.spatial_index, SpatialIndex::Grid);

        let err = CoordinatorConfig::from_json_str(r#"{ "update_rate_hz": -1.0 }"#).unwrap_err();
        assert_eq!(err, ConfigError::InvalidRate(-1.0));

        assert!(matches!(CoordinatorConfig::from_json_str("not json"), Err(ConfigError::Parse(_))));
    }
}
