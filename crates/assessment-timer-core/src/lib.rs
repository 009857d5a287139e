// crates/assessment-timer-core/src/lib.rs
// ============================================================================
// Module: Assessment Timer Core
// Description: Timer state machine, timeline queries, and storage codecs.
// Purpose: Record and evaluate time spent in a hierarchical assessment.
// Dependencies: serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! The timer records server-clock ranges as test takers move through a test,
//! part, section, and item hierarchy, reconciles client-reported durations
//! inside those ranges, and answers remaining-time and timeout questions per
//! scope. State survives between requests through a [`TimerStorage`] using
//! one of two interchangeable encodings, both of which also read the legacy
//! serialized form written by older deployments.
//! Invariants:
//! - Server ranges for one tag path never move backward in time.
//! - Every codec decodes what any other codec encodes to an equal
//!   [`TimerState`].
//!
//! Stored blobs are untrusted input; decoders fail closed with
//! [`TimerError::InvalidData`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod format;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;
pub use format::JsonFormat;
pub use format::PackedFormat;
pub use format::TimerFormat;
pub use interfaces::LabelFormatter;
pub use interfaces::StorageFormat;
pub use interfaces::StoreError;
pub use interfaces::TimerStorage;
pub use runtime::InMemoryTimerStorage;
pub use runtime::SessionLocks;
pub use runtime::TIMEPOINT_INTERVAL;
pub use runtime::Timer;
