// crates/assessment-timer-core/src/core/mod.rs
// ============================================================================
// Module: Assessment Timer Core Types
// Description: Time points, timelines, adjustments, state, and constraints.
// Purpose: Provide the value types every timer operation and codec works on.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain values with validated constructors. They carry no
//! I/O and no clock; the runtime supplies timestamps and collaborators.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adjustment;
pub mod constraint;
pub mod error;
pub mod point;
pub mod state;
pub mod tags;
pub mod timeline;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adjustment::Adjustment;
pub use adjustment::AdjustmentMap;
pub use constraint::ExtraTimeAllowance;
pub use constraint::PlainLabelFormatter;
pub use constraint::ScopeKind;
pub use constraint::ScopeNode;
pub use constraint::TimeConstraint;
pub use constraint::TimeLimits;
pub use constraint::constraint_payload;
pub use error::TimerError;
pub use point::PointType;
pub use point::TargetCriteria;
pub use point::TimePoint;
pub use point::TimeTarget;
pub use point::round_micros;
pub use state::TimerState;
pub use tags::TagFilter;
pub use tags::TagPath;
pub use timeline::TimeLine;
