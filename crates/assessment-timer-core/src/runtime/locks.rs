// crates/assessment-timer-core/src/runtime/locks.rs
// ============================================================================
// Module: Session Locks
// Description: Per-session mutual exclusion for the load/mutate/save cycle.
// Purpose: Guarantee at most one writer per session inside one process.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Two requests for the same session (a duplicate submit, for example) must
//! not interleave their load, mutation, and save of the timer. Callers run
//! the whole cycle inside [`SessionLocks::with_session`]. Locks of idle
//! sessions are dropped from the registry once their last holder leaves.
//!
//! This only covers one process. Deployments with several processes sharing
//! a store need an external lock keyed the same way.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Session Locks
// ============================================================================

/// Registry of per-session locks.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    /// Session identifier to its lock.
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` while holding the lock of `session_id`.
    ///
    /// A lock poisoned by a panicking holder is still acquired: it guards no
    /// data of its own.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the registry mutex is poisoned.
    pub fn with_session<T>(
        &self,
        session_id: &str,
        action: impl FnOnce() -> T,
    ) -> Result<T, StoreError> {
        let lock = self.acquire(session_id)?;
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            action()
        };
        self.release(session_id, &lock)?;
        Ok(result)
    }

    /// Returns the number of sessions currently holding or awaiting a lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the registry mutex is poisoned.
    pub fn active_sessions(&self) -> Result<usize, StoreError> {
        Ok(self.registry()?.len())
    }

    /// Returns the lock of a session, creating it when absent.
    fn acquire(&self, session_id: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut registry = self.registry()?;
        Ok(Arc::clone(registry.entry(session_id.to_string()).or_default()))
    }

    /// Drops the lock of a session when nobody else references it.
    fn release(&self, session_id: &str, lock: &Arc<Mutex<()>>) -> Result<(), StoreError> {
        let mut registry = self.registry()?;
        if Arc::strong_count(lock) == 2 {
            registry.remove(session_id);
        }
        Ok(())
    }

    /// Locks the registry.
    fn registry(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>>, StoreError> {
        self.locks.lock().map_err(|_| StoreError::Store("session lock registry poisoned".to_string()))
    }
}
