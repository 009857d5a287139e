// crates/assessment-timer-core/src/interfaces/mod.rs
// ============================================================================
// Module: Assessment Timer Interfaces
// Description: Collaborator contracts for persistence, encoding, and labels.
// Purpose: Keep the timer independent from storage backends and presentation.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The timer talks to the outside world through three narrow seams: a
//! key-value [`TimerStorage`], a [`StorageFormat`] codec, and a
//! [`LabelFormatter`] used when projecting constraints for display.
//! Implementations must treat stored blobs as untrusted input and fail closed
//! on anything they cannot interpret.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::constraint::ScopeNode;
use crate::core::error::TimerError;
use crate::core::state::TimerState;

// ============================================================================
// SECTION: Timer Storage
// ============================================================================

/// Timer storage errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("timer store io error: {0}")]
    Io(String),
    /// Stored value is corrupted or fails integrity checks.
    #[error("timer store corruption: {0}")]
    Corrupt(String),
    /// Stored schema version is incompatible.
    #[error("timer store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request or stored data is invalid.
    #[error("timer store invalid data: {0}")]
    Invalid(String),
    /// Backend reported an error.
    #[error("timer store error: {0}")]
    Store(String),
}

/// Key-value storage for serialized timer state.
///
/// Keys are chosen by the caller and scoped by owner (usually the test
/// taker). Reads and writes are atomic per key.
pub trait TimerStorage {
    /// Reads the value stored under `owner_id`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, owner_id: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `owner_id`/`key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set(&self, owner_id: &str, key: &str, value: &str) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Storage Format
// ============================================================================

/// Codec turning [`TimerState`] into a transport string and back.
pub trait StorageFormat {
    /// Encodes the state.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] when the state cannot be encoded.
    fn encode(&self, state: &TimerState) -> Result<String, TimerError>;

    /// Decodes a stored string.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] when the input is not a recognized
    /// timer state shape.
    fn decode(&self, input: &str) -> Result<TimerState, TimerError>;
}

// ============================================================================
// SECTION: Label Formatting
// ============================================================================

/// Produces the human-readable label shown next to a time constraint.
pub trait LabelFormatter {
    /// Returns the display label for a scope node.
    fn format_label(&self, node: &ScopeNode) -> String;
}
