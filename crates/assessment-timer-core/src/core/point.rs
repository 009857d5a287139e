// crates/assessment-timer-core/src/core/point.rs
// ============================================================================
// Module: Time Points
// Description: Immutable start/end events recorded on the server or client clock.
// Purpose: Provide the atomic record every timeline query and codec works on.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`TimePoint`] marks the start or the end of a range for one tag path on
//! one clock. Timestamps are seconds since the Unix epoch and are normalized
//! to microsecond precision so that every codec reproduces them exactly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::TimerError;
use crate::core::tags::TagFilter;
use crate::core::tags::TagPath;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of microseconds in one second.
pub(crate) const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Rounds a number of seconds to microsecond precision.
#[must_use]
pub fn round_micros(seconds: f64) -> f64 {
    (seconds * MICROS_PER_SECOND).round() / MICROS_PER_SECOND
}

// ============================================================================
// SECTION: Point Kinds
// ============================================================================

/// Whether a point opens or closes a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    /// Range start.
    Start,
    /// Range end.
    End,
}

impl PointType {
    /// Returns the wire code (`1` start, `2` end).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Start => 1,
            Self::End => 2,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for unknown codes.
    pub fn from_code(code: u8) -> Result<Self, TimerError> {
        match code {
            1 => Ok(Self::Start),
            2 => Ok(Self::End),
            other => Err(TimerError::invalid(format!("unknown time point type: {other}"))),
        }
    }
}

/// Clock a point was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTarget {
    /// Reconciled duration reported by the test taker's client.
    Client,
    /// Authoritative server clock.
    Server,
}

impl TimeTarget {
    /// Returns the wire code (`1` client, `2` server).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Client => 1,
            Self::Server => 2,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for unknown codes.
    pub fn from_code(code: u8) -> Result<Self, TimerError> {
        match code {
            1 => Ok(Self::Client),
            2 => Ok(Self::Server),
            other => Err(TimerError::invalid(format!("unknown time point target: {other}"))),
        }
    }
}

/// Target criteria accepted by queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCriteria {
    /// Client clock only.
    Client,
    /// Server clock only.
    Server,
    /// Both clocks. Valid for lookups, rejected when summing durations.
    All,
}

impl TargetCriteria {
    /// Returns true when the target satisfies the criteria.
    #[must_use]
    pub fn matches(self, target: TimeTarget) -> bool {
        match self {
            Self::All => true,
            Self::Client => target == TimeTarget::Client,
            Self::Server => target == TimeTarget::Server,
        }
    }
}

impl From<TimeTarget> for TargetCriteria {
    fn from(target: TimeTarget) -> Self {
        match target {
            TimeTarget::Client => Self::Client,
            TimeTarget::Server => Self::Server,
        }
    }
}

// ============================================================================
// SECTION: Time Point
// ============================================================================

/// Immutable event record on a timeline.
///
/// # Invariants
/// - `timestamp` is finite and rounded to microseconds.
/// - Equality compares timestamps at microsecond precision.
#[derive(Debug, Clone)]
pub struct TimePoint {
    /// Scope path the point belongs to.
    tags: TagPath,
    /// Seconds since the Unix epoch.
    timestamp: f64,
    /// Start or end marker.
    point_type: PointType,
    /// Clock the point was recorded on.
    target: TimeTarget,
}

impl TimePoint {
    /// Creates a new time point.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] when the timestamp is not finite.
    pub fn new(
        tags: TagPath,
        timestamp: f64,
        point_type: PointType,
        target: TimeTarget,
    ) -> Result<Self, TimerError> {
        if !timestamp.is_finite() {
            return Err(TimerError::invalid(format!("timestamp must be finite, got {timestamp}")));
        }
        Ok(Self {
            tags,
            timestamp: round_micros(timestamp),
            point_type,
            target,
        })
    }

    /// Returns the tag path.
    #[must_use]
    pub const fn tags(&self) -> &TagPath {
        &self.tags
    }

    /// Returns the timestamp in seconds.
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Returns the timestamp in whole microseconds.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Timestamps are finite and far inside the i64 microsecond range."
    )]
    pub fn micros(&self) -> i64 {
        (self.timestamp * MICROS_PER_SECOND).round() as i64
    }

    /// Returns the point type.
    #[must_use]
    pub const fn point_type(&self) -> PointType {
        self.point_type
    }

    /// Returns the target clock.
    #[must_use]
    pub const fn target(&self) -> TimeTarget {
        self.target
    }

    /// Returns true for start points.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.point_type == PointType::Start
    }

    /// Returns true for end points.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.point_type == PointType::End
    }

    /// Returns true when the point satisfies both filters.
    #[must_use]
    pub fn matches(&self, filter: &TagFilter, target: TargetCriteria) -> bool {
        target.matches(self.target) && filter.matches(&self.tags)
    }
}

impl PartialEq for TimePoint {
    fn eq(&self, other: &Self) -> bool {
        self.micros() == other.micros()
            && self.point_type == other.point_type
            && self.target == other.target
            && self.tags == other.tags
    }
}

impl Eq for TimePoint {}
