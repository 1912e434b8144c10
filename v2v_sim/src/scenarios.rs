//! Traffic scenarios for the V2V harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// V2V-001: Three-lane highway, mixed speeds
    Highway,

    /// V2V-002: Two streams crossing at an unsignalled junction
    Intersection,

    /// V2V-003: Two vehicles approaching head-on in one lane
    HeadOn,

    /// V2V-004: Close-following platoon whose leader brakes hard
    Platoon,

    /// V2V-005: Actors destroyed, unregistered and corrupted mid-run
    Dropout,

    // ═══════════════════════════════════════════════════
    // STRESS SCENARIOS
    // ═══════════════════════════════════════════════════
    /// V2V-006: 200 vehicles on a tight grid (spatial index path)
    DenseGrid,

    /// V2V-007: 100 Hz host loop against a 2 Hz network
    RapidFire,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Highway,
            ScenarioId::Intersection,
            ScenarioId::HeadOn,
            ScenarioId::Platoon,
            ScenarioId::Dropout,
            ScenarioId::DenseGrid,
            ScenarioId::RapidFire,
        ]
    }

    /// Returns standard scenarios (not stress).
    pub fn standard() -> Vec<ScenarioId> {
        Self::all().into_iter().filter(|s| !s.is_stress()).collect()
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Highway => "highway",
            ScenarioId::Intersection => "intersection",
            ScenarioId::HeadOn => "head_on",
            ScenarioId::Platoon => "platoon",
            ScenarioId::Dropout => "dropout",
            ScenarioId::DenseGrid => "dense_grid",
            ScenarioId::RapidFire => "rapid_fire",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Highway => "Three lanes, 25-33 m/s, verify neighbor symmetry and sequence counters",
            ScenarioId::Intersection => "Crossing streams with sharing enabled, expect warnings and shares",
            ScenarioId::HeadOn => "Single lane head-on approach, expect a critical threat before the pass",
            ScenarioId::Platoon => "20 m gaps at equal speed, no threats until the leader brakes",
            ScenarioId::Dropout => "Actor loss, late unregister and corrupted positions never break a tick",
            ScenarioId::DenseGrid => "200 vehicles at 15 m spacing, grid discovery must equal brute force",
            ScenarioId::RapidFire => "100 Hz updates absorbed by the rate limiter, exactly 2 Hz accepted",
        }
    }

    /// Returns true if this is a stress scenario.
    pub fn is_stress(&self) -> bool {
        matches!(self, ScenarioId::DenseGrid | ScenarioId::RapidFire)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highway" | "v2v-001" => Ok(ScenarioId::Highway),
            "intersection" | "v2v-002" => Ok(ScenarioId::Intersection),
            "head_on" | "headon" | "v2v-003" => Ok(ScenarioId::HeadOn),
            "platoon" | "v2v-004" => Ok(ScenarioId::Platoon),
            "dropout" | "v2v-005" => Ok(ScenarioId::Dropout),
            "dense_grid" | "densegrid" | "v2v-006" => Ok(ScenarioId::DenseGrid),
            "rapid_fire" | "rapidfire" | "v2v-007" => Ok(ScenarioId::RapidFire),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("V2V-003".parse::<ScenarioId>(), Ok(ScenarioId::HeadOn));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_standard_excludes_stress() {
        let standard = ScenarioId::standard();
        assert_eq!(standard.len(), 5);
        assert!(standard.iter().all(|s| !s.is_stress()));
    }
}
