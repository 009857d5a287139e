// crates/assessment-timer-core/src/runtime/mod.rs
// ============================================================================
// Module: Assessment Timer Runtime
// Description: Timer state machine, in-memory storage, and session locks.
// Purpose: Execute timer operations against injected collaborators.
// Dependencies: crate::{core, format, interfaces}
// ============================================================================

//! ## Overview
//! The runtime owns the mutable side of the crate: the [`Timer`] itself, a
//! process-local [`InMemoryTimerStorage`], and the [`SessionLocks`] registry
//! callers use to serialize requests of one session.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod locks;
pub mod store;
pub mod timer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use locks::SessionLocks;
pub use store::InMemoryTimerStorage;
pub use timer::TIMEPOINT_INTERVAL;
pub use timer::Timer;
