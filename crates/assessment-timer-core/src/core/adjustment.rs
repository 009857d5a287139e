// crates/assessment-timer-core/src/core/adjustment.rs
// ============================================================================
// Module: Timer Adjustment Map
// Description: Per-scope additive time corrections.
// Purpose: Track time granted or withdrawn for a scope by an administrator.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each scope tag maps to the seconds added and removed for it. The net
//! adjustment (`increase - decrease`) is applied on top of the configured
//! maximum duration when the remaining time is reported.
//!
//! The wire form is a JSON object keyed by tag. Older deployments emitted an
//! empty JSON array for an empty map, and a list of `{source, increase,
//! decrease}` records; both still decode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::SeqAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;

use crate::core::error::TimerError;

// ============================================================================
// SECTION: Adjustment
// ============================================================================

/// Seconds added to and removed from one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Seconds granted.
    #[serde(default)]
    pub increase: f64,
    /// Seconds withdrawn.
    #[serde(default)]
    pub decrease: f64,
}

impl Adjustment {
    /// Returns the net adjustment in seconds.
    #[must_use]
    pub fn net(&self) -> f64 {
        self.increase - self.decrease
    }
}

/// Adjustment record used by the list wire form.
#[derive(Deserialize)]
struct AdjustmentRecord {
    /// Scope tag the record applies to.
    source: String,
    /// Seconds granted.
    #[serde(default)]
    increase: f64,
    /// Seconds withdrawn.
    #[serde(default)]
    decrease: f64,
}

// ============================================================================
// SECTION: Adjustment Map
// ============================================================================

/// Mapping from scope tag to its time adjustment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustmentMap {
    /// Adjustments keyed by scope tag.
    entries: BTreeMap<String, Adjustment>,
}

impl AdjustmentMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds granted seconds to a scope.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for negative or non-finite seconds.
    pub fn increase(&mut self, tag: impl Into<String>, seconds: f64) -> Result<(), TimerError> {
        validate_seconds(seconds)?;
        self.entries.entry(tag.into()).or_default().increase += seconds;
        Ok(())
    }

    /// Adds withdrawn seconds to a scope.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for negative or non-finite seconds.
    pub fn decrease(&mut self, tag: impl Into<String>, seconds: f64) -> Result<(), TimerError> {
        validate_seconds(seconds)?;
        self.entries.entry(tag.into()).or_default().decrease += seconds;
        Ok(())
    }

    /// Returns the net adjustment for a scope, zero when absent.
    #[must_use]
    pub fn get(&self, tag: &str) -> f64 {
        self.entries.get(tag).map_or(0.0, Adjustment::net)
    }

    /// Returns the raw adjustment for a scope.
    #[must_use]
    pub fn entry(&self, tag: &str) -> Option<&Adjustment> {
        self.entries.get(tag)
    }

    /// Removes the adjustment of a scope.
    pub fn remove(&mut self, tag: &str) -> Option<Adjustment> {
        self.entries.remove(tag)
    }

    /// Iterates over `(tag, adjustment)` pairs in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Adjustment)> {
        self.entries.iter().map(|(tag, adjustment)| (tag.as_str(), adjustment))
    }

    /// Returns the number of adjusted scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no scope is adjusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rejects negative or non-finite adjustments.
fn validate_seconds(seconds: f64) -> Result<(), TimerError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimerError::invalid(format!(
            "adjustment must be a non-negative number of seconds, got {seconds}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Serde
// ============================================================================

impl Serialize for AdjustmentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tag, adjustment) in &self.entries {
            map.serialize_entry(tag, adjustment)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AdjustmentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AdjustmentMapVisitor)
    }
}

/// Accepts the object form and both list forms of the adjustment map.
struct AdjustmentMapVisitor;

impl<'de> Visitor<'de> for AdjustmentMapVisitor {
    type Value = AdjustmentMap;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an adjustment map object or a list of adjustment records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((tag, adjustment)) = access.next_entry::<String, Adjustment>()? {
            validate_seconds(adjustment.increase).map_err(serde::de::Error::custom)?;
            validate_seconds(adjustment.decrease).map_err(serde::de::Error::custom)?;
            entries.insert(tag, adjustment);
        }
        Ok(AdjustmentMap {
            entries,
        })
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(record) = access.next_element::<AdjustmentRecord>()? {
            validate_seconds(record.increase).map_err(serde::de::Error::custom)?;
            validate_seconds(record.decrease).map_err(serde::de::Error::custom)?;
            let entry: &mut Adjustment = entries.entry(record.source).or_default();
            entry.increase += record.increase;
            entry.decrease += record.decrease;
        }
        Ok(AdjustmentMap {
            entries,
        })
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(AdjustmentMap::new())
    }
}
