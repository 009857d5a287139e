// crates/assessment-timer-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Timer Storage
// Description: Process-local key-value storage for timer state.
// Purpose: Back tests, demos, and single-process deployments.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryTimerStorage`] keeps serialized timer state in a mutex-guarded
//! map. Clones share the same map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::interfaces::StoreError;
use crate::interfaces::TimerStorage;

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// In-memory timer storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTimerStorage {
    /// Values keyed by `(owner_id, key)`.
    values: Arc<Mutex<BTreeMap<(String, String), String>>>,
}

impl InMemoryTimerStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys stored for an owner, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the mutex is poisoned.
    pub fn keys(&self, owner_id: &str) -> Result<Vec<String>, StoreError> {
        let guard = self
            .values
            .lock()
            .map_err(|_| StoreError::Store("timer store mutex poisoned".to_string()))?;
        Ok(guard
            .keys()
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

impl TimerStorage for InMemoryTimerStorage {
    fn get(&self, owner_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self
            .values
            .lock()
            .map_err(|_| StoreError::Store("timer store mutex poisoned".to_string()))?;
        Ok(guard.get(&(owner_id.to_string(), key.to_string())).cloned())
    }

    fn set(&self, owner_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| StoreError::Store("timer store mutex poisoned".to_string()))?;
        guard.insert((owner_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}
