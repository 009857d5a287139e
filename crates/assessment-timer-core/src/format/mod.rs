// crates/assessment-timer-core/src/format/mod.rs
// ============================================================================
// Module: Timer Storage Formats
// Description: Closed set of codecs for persisted timer state.
// Purpose: Encode timer state for storage and decode any known stored shape.
// Dependencies: crate::{core, interfaces}, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! Two encoders exist: the verbose [`JsonFormat`] and the size-optimized
//! [`PackedFormat`]. Both share one decoder, so either codec reads what the
//! other wrote as well as the legacy serialized blobs of older deployments.
//!
//! Decoding is a tagged-union attempt on the input shape:
//! - empty input is a fresh state;
//! - a JSON object with `"format": "pack"` is a packed document;
//! - any other JSON object is the verbose envelope;
//! - everything else is a legacy serialized blob.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod json;
pub mod legacy;
pub mod packed;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use tracing::debug;

use crate::core::error::TimerError;
use crate::core::state::TimerState;
use crate::interfaces::StorageFormat;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use json::JsonFormat;
pub use packed::PACKED_FORMAT_NAME;
pub use packed::PACKED_FORMAT_VERSION;
pub use packed::PackedFormat;

// ============================================================================
// SECTION: Timer Format
// ============================================================================

/// Storage format selected for a timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerFormat {
    /// Verbose JSON envelope.
    Json(JsonFormat),
    /// Packed JSON document with shared tag prefix and relative timestamps.
    Packed(PackedFormat),
}

impl TimerFormat {
    /// Returns the verbose format.
    #[must_use]
    pub const fn json() -> Self {
        Self::Json(JsonFormat)
    }

    /// Returns the packed format using the current UTC day as epoch.
    #[must_use]
    pub const fn packed() -> Self {
        Self::Packed(PackedFormat::new())
    }

    /// Returns the format name used in configuration.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Packed(_) => "packed",
        }
    }
}

impl Default for TimerFormat {
    fn default() -> Self {
        Self::json()
    }
}

impl StorageFormat for TimerFormat {
    fn encode(&self, state: &TimerState) -> Result<String, TimerError> {
        match self {
            Self::Json(format) => format.encode(state),
            Self::Packed(format) => format.encode(state),
        }
    }

    fn decode(&self, input: &str) -> Result<TimerState, TimerError> {
        match self {
            Self::Json(format) => format.decode(input),
            Self::Packed(format) => format.decode(input),
        }
    }
}

// ============================================================================
// SECTION: Shared Decoder
// ============================================================================

/// Minimal view of a JSON document used to select its decoder.
#[derive(Deserialize)]
struct FormatProbe {
    /// Format marker, `pack` for packed documents.
    #[serde(default)]
    format: Option<String>,
    /// Packed document version.
    #[serde(default)]
    version: Option<u32>,
}

/// Decodes any known stored shape into a timer state.
///
/// # Errors
///
/// Returns [`TimerError::InvalidData`] when the input matches no known shape.
pub fn decode_state(input: &str) -> Result<TimerState, TimerError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(TimerState::new());
    }
    if input.starts_with('{') {
        let probe: FormatProbe = serde_json::from_str(input)
            .map_err(|err| TimerError::invalid(format!("malformed timer document: {err}")))?;
        if probe.format.as_deref() == Some(PACKED_FORMAT_NAME) {
            debug!(version = ?probe.version, "decoding packed timer state");
            return packed::decode_document(input, probe.version);
        }
        debug!("decoding json timer state");
        return json::decode_envelope(input);
    }
    debug!("decoding legacy timer state");
    legacy::decode_state(input)
}
