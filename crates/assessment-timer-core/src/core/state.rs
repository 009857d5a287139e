// crates/assessment-timer-core/src/core/state.rs
// ============================================================================
// Module: Timer State
// Description: Canonical in-memory state shared by every storage codec.
// Purpose: Define the single value that encode/decode round trips preserve.
// Dependencies: crate::core::{adjustment, timeline}
// ============================================================================

//! ## Overview
//! [`TimerState`] is what gets persisted between requests. Every codec
//! encodes and decodes this value only, so round-trip equivalence between
//! formats is equality on [`TimerState`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::adjustment::AdjustmentMap;
use crate::core::timeline::TimeLine;

// ============================================================================
// SECTION: Timer State
// ============================================================================

/// Persisted timer state.
///
/// # Invariants
/// - Scalar fields are finite, non-negative seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerState {
    /// Recorded time points.
    pub timeline: TimeLine,
    /// Extra time budget granted to the test taker, in seconds.
    pub extra_time: f64,
    /// Administrator-granted extension, in seconds.
    pub extended_time: f64,
    /// Extra time already drawn from the budget, in seconds.
    pub consumed_extra_time: f64,
    /// Per-scope time adjustments.
    pub adjustment_map: AdjustmentMap,
}

impl TimerState {
    /// Creates an empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeline: TimeLine::new(),
            extra_time: 0.0,
            extended_time: 0.0,
            consumed_extra_time: 0.0,
            adjustment_map: AdjustmentMap::new(),
        }
    }

    /// Creates a state holding only a timeline.
    #[must_use]
    pub fn with_timeline(timeline: TimeLine) -> Self {
        Self {
            timeline,
            ..Self::new()
        }
    }

    /// Returns true when nothing was recorded or granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
            && self.extra_time == 0.0
            && self.extended_time == 0.0
            && self.consumed_extra_time == 0.0
            && self.adjustment_map.is_empty()
    }
}
