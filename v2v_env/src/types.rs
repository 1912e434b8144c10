//! Common identifier types.

use serde::{Deserialize, Serialize};

/// Identifier of a vehicle inside the V2V network.
///
/// Stable for as long as the vehicle stays registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u32);

impl VehicleId {
    /// Returns the raw integer value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for VehicleId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of an actor in the external simulation.
///
/// The simulator owns this namespace; a V2V vehicle maps onto exactly one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_id_ordering() {
        let mut ids = vec![VehicleId(7), VehicleId(2), VehicleId(5)];
        ids.sort();
        assert_eq!(ids, vec![VehicleId(2), VehicleId(5), VehicleId(7)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(VehicleId(3).to_string(), "v3");
        assert_eq!(ActorId(42).to_string(), "actor#42");
    }
}
