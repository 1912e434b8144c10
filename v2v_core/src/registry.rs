//! Vehicle registry - who participates in V2V.
//!
//! Registration may happen from any thread at any time (vehicles are
//! spawned and destroyed by the external simulation). All mutation goes
//! through one mutex, so a tick always reads a complete point-in-time view.

use crate::builder::VehicleHandle;
use crate::error::CoordinatorError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;
use v2v_env::VehicleId;

/// A registered vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub handle: VehicleHandle,

    /// Cooperative sharing explicitly enabled for this vehicle
    pub sharing_enabled: bool,

    /// Distinguishes successive registrations of the same id
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: BTreeMap<VehicleId, RegistryEntry>,
    next_epoch: u64,
}

/// Thread-safe mapping of vehicle id -> vehicle handle.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vehicle.
    ///
    /// # Errors
    /// `CoordinatorError::DuplicateId` if `id` is already registered; the
    /// existing entry is left untouched.
    pub fn register(&self, id: VehicleId, handle: VehicleHandle) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            return Err(CoordinatorError::DuplicateId(id));
        }

        let epoch = inner.next_epoch;
        inner.next_epoch += 1;
        inner.entries.insert(
            id,
            RegistryEntry {
                handle,
                sharing_enabled: false,
                epoch,
            },
        );

        debug!("Vehicle {} registered to V2V network ({})", id, handle.actor_id);
        Ok(())
    }

    /// Removes a vehicle. Unknown ids are ignored.
    ///
    /// Returns whether the vehicle was registered.
    pub fn unregister(&self, id: VehicleId) -> bool {
        let removed = self.inner.lock().entries.remove(&id).is_some();
        if removed {
            debug!("Vehicle {} unregistered from V2V network", id);
        }
        removed
    }

    /// Sets the cooperative sharing flag. Returns false for unknown ids.
    pub fn set_sharing(&self, id: VehicleId, enabled: bool) -> bool {
        match self.inner.lock().entries.get_mut(&id) {
            Some(entry) => {
                entry.sharing_enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn sharing_enabled(&self, id: VehicleId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&id)
            .map(|entry| entry.sharing_enabled)
            .unwrap_or(false)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    pub fn get(&self, id: VehicleId) -> Option<RegistryEntry> {
        self.inner.lock().entries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<VehicleId> {
        self.inner.lock().entries.keys().copied().collect()
    }

    /// Consistent copy of every entry, taken under a single lock.
    pub fn snapshot(&self) -> BTreeMap<VehicleId, RegistryEntry> {
        self.inner.lock().entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::VehicleClass;
    use std::sync::Arc;
    use v2v_env::ActorId;

    fn handle(actor: u64) -> VehicleHandle {
        VehicleHandle::new(ActorId(actor), VehicleClass::PassengerCar)
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        registry.register(VehicleId(1), handle(100)).unwrap();

        let err = registry.register(VehicleId(1), handle(200)).unwrap_err();
        assert_eq!(err, CoordinatorError::DuplicateId(VehicleId(1)));

        // Original entry untouched
        assert_eq!(registry.get(VehicleId(1)).unwrap().handle.actor_id, ActorId(100));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = Registry::new();
        assert!(!registry.unregister(VehicleId(42)));

        registry.register(VehicleId(42), handle(1)).unwrap();
        assert!(registry.unregister(VehicleId(42)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_gets_new_epoch() {
        let registry = Registry::new();
        registry.register(VehicleId(1), handle(1)).unwrap();
        let first = registry.get(VehicleId(1)).unwrap().epoch;

        registry.unregister(VehicleId(1));
        registry.register(VehicleId(1), handle(1)).unwrap();
        let second = registry.get(VehicleId(1)).unwrap().epoch;

        assert_ne!(first, second);
    }

    #[test]
    fn test_sharing_flag() {
        let registry = Registry::new();
        registry.register(VehicleId(1), handle(1)).unwrap();
        assert!(!registry.sharing_enabled(VehicleId(1)));

        assert!(registry.set_sharing(VehicleId(1), true));
        assert!(registry.sharing_enabled(VehicleId(1)));
        assert!(!registry.set_sharing(VehicleId(2), true));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let threads: Vec<_> = (0..4u32)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        registry.register(VehicleId(t * 1000 + i), handle(i as u64)).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
        assert_eq!(registry.snapshot().len(), 200);
    }
}
