// crates/assessment-timer-core/src/core/error.rs
// ============================================================================
// Module: Assessment Timer Errors
// Description: Error taxonomy shared by the timeline, timer, and codecs.
// Purpose: Surface deterministic, input-driven failures to the delivery layer.
// Dependencies: thiserror, crate::interfaces
// ============================================================================

//! ## Overview
//! Every failure raised by the timer is a pure function of its input. Nothing
//! is retried internally; callers decide how to present the failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timer and codec errors.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Input data is malformed (tags, timestamps, durations, decoded payloads).
    #[error("invalid timer data: {0}")]
    InvalidData(String),
    /// A time range would move backward or is not in the expected state.
    #[error("inconsistent time range: {0}")]
    InconsistentRange(String),
    /// Query criteria cannot be combined (for example summing both clocks).
    #[error("inconsistent criteria: {0}")]
    InconsistentCriteria(String),
    /// Persistence was requested without a configured storage collaborator.
    #[error("invalid timer storage: {0}")]
    InvalidStorage(String),
    /// The storage collaborator reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TimerError {
    /// Builds an [`TimerError::InvalidData`] from any displayable message.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}
