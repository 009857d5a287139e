// crates/assessment-timer-core/src/runtime/timer.rs
// ============================================================================
// Module: Assessment Timer
// Description: State machine recording and evaluating time per scope.
// Purpose: Drive start/end/adjust/compute/timeout and the persistence round trip.
// Dependencies: crate::{core, format, interfaces}, tracing
// ============================================================================

//! ## Overview
//! A [`Timer`] is built per request, optionally loaded from storage, mutated
//! by navigation events, and saved at the end of the request. It is not
//! shared between requests; callers serialize the load/mutate/save cycle per
//! session (see [`crate::runtime::SessionLocks`]).
//!
//! Server points come from request timestamps. Client points are never
//! recorded directly: [`Timer::adjust`] derives them by centering the
//! client-reported duration inside the last closed server range.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::adjustment::AdjustmentMap;
use crate::core::error::TimerError;
use crate::core::point::PointType;
use crate::core::point::TargetCriteria;
use crate::core::point::TimePoint;
use crate::core::point::TimeTarget;
use crate::core::point::round_micros;
use crate::core::state::TimerState;
use crate::core::tags::TagFilter;
use crate::core::tags::TagPath;
use crate::core::timeline::TimeLine;
use crate::format::TimerFormat;
use crate::interfaces::StorageFormat;
use crate::interfaces::TimerStorage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Gap, in seconds, between an implicit end and the start that caused it.
pub const TIMEPOINT_INTERVAL: f64 = 0.0001;

// ============================================================================
// SECTION: Storage Binding
// ============================================================================

/// Storage collaborator plus the location of this timer's state.
#[derive(Clone)]
struct StorageBinding {
    /// Key-value storage.
    storage: Arc<dyn TimerStorage + Send + Sync>,
    /// Owner scope, usually the test taker.
    owner_id: String,
    /// Storage key, usually derived from the session.
    key: String,
}

// ============================================================================
// SECTION: Timer
// ============================================================================

/// Request-scoped assessment timer.
///
/// # Invariants
/// - Server points of one tag path never move backward in time.
/// - Client points exist only as centered pairs written by [`Timer::adjust`].
#[derive(Clone, Default)]
pub struct Timer {
    /// Recorded state.
    state: TimerState,
    /// Optional persistence collaborator.
    storage: Option<StorageBinding>,
    /// Codec used by save and load.
    format: TimerFormat,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("state", &self.state)
            .field("owner_id", &self.storage.as_ref().map(|binding| binding.owner_id.as_str()))
            .field("key", &self.storage.as_ref().map(|binding| binding.key.as_str()))
            .field("format", &self.format)
            .finish()
    }
}

impl Timer {
    /// Creates an empty timer without storage, using the Json format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timer holding an existing state.
    #[must_use]
    pub fn from_state(state: TimerState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Attaches a storage collaborator and the location of the state.
    #[must_use]
    pub fn with_storage(
        mut self,
        storage: Arc<dyn TimerStorage + Send + Sync>,
        owner_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.storage = Some(StorageBinding {
            storage,
            owner_id: owner_id.into(),
            key: key.into(),
        });
        self
    }

    /// Selects the storage format.
    #[must_use]
    pub fn with_format(mut self, format: TimerFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the storage format.
    #[must_use]
    pub const fn format(&self) -> TimerFormat {
        self.format
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &TimerState {
        &self.state
    }

    /// Consumes the timer and returns its state.
    #[must_use]
    pub fn into_state(self) -> TimerState {
        self.state
    }

    /// Returns the recorded timeline.
    #[must_use]
    pub const fn timeline(&self) -> &TimeLine {
        &self.state.timeline
    }

    /// Returns the adjustment map.
    #[must_use]
    pub const fn adjustment_map(&self) -> &AdjustmentMap {
        &self.state.adjustment_map
    }

    /// Returns the adjustment map for modification.
    pub const fn adjustment_map_mut(&mut self) -> &mut AdjustmentMap {
        &mut self.state.adjustment_map
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Opens a server range for `tags` at `timestamp`.
    ///
    /// A range still open for the same tags is closed just before the new
    /// start, at `timestamp - TIMEPOINT_INTERVAL`.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidData`] for empty tags or a non-finite timestamp.
    /// - [`TimerError::InconsistentRange`] when a server point for the same
    ///   tags is later than `timestamp`. The timeline is left untouched.
    pub fn start<S: AsRef<str>>(&mut self, tags: &[S], timestamp: f64) -> Result<(), TimerError> {
        let path = TagPath::new(tags)?;
        let start = TimePoint::new(path.clone(), timestamp, PointType::Start, TimeTarget::Server)?;
        let last = self.last_server_point(&path);
        if let Some(last) = last
            && last.micros() > start.micros()
        {
            return Err(TimerError::InconsistentRange(format!(
                "cannot start {path} at {} before its last point at {}",
                start.timestamp(),
                last.timestamp()
            )));
        }
        if last.is_some_and(TimePoint::is_start) {
            let end = TimePoint::new(
                path.clone(),
                timestamp - TIMEPOINT_INTERVAL,
                PointType::End,
                TimeTarget::Server,
            )?;
            debug!(tags = %path, timestamp = end.timestamp(), "closing open range before restart");
            self.state.timeline.add(end);
        }
        self.state.timeline.add(start);
        Ok(())
    }

    /// Closes the open server range for `tags` at `timestamp`.
    ///
    /// Without an open range the call changes nothing.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidData`] for empty tags or a non-finite timestamp.
    /// - [`TimerError::InconsistentRange`] when `timestamp` precedes the open
    ///   start.
    pub fn end<S: AsRef<str>>(&mut self, tags: &[S], timestamp: f64) -> Result<(), TimerError> {
        let path = TagPath::new(tags)?;
        let end = TimePoint::new(path.clone(), timestamp, PointType::End, TimeTarget::Server)?;
        let Some(open) = self.last_server_point(&path).filter(|point| point.is_start()) else {
            debug!(tags = %path, timestamp = end.timestamp(), "ignoring end without open range");
            return Ok(());
        };
        if end.micros() < open.micros() {
            return Err(TimerError::InconsistentRange(format!(
                "cannot end {path} at {} before its start at {}",
                end.timestamp(),
                open.timestamp()
            )));
        }
        self.state.timeline.add(end);
        Ok(())
    }

    /// Records the client-observed duration of the last closed server range.
    ///
    /// The duration is capped at the server duration (or equals it when
    /// `None`) and centered inside the server range. Previous client points
    /// of the same tags are replaced.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidData`] for empty tags or a negative or
    ///   non-finite duration.
    /// - [`TimerError::InconsistentRange`] when no closed server range exists
    ///   for the tags.
    pub fn adjust<S: AsRef<str>>(
        &mut self,
        tags: &[S],
        duration: Option<f64>,
    ) -> Result<(), TimerError> {
        let path = TagPath::new(tags)?;
        if let Some(duration) = duration
            && (!duration.is_finite() || duration < 0.0)
        {
            return Err(TimerError::invalid(format!(
                "duration must be a non-negative number of seconds, got {duration}"
            )));
        }
        let Some((start, end)) = self.last_closed_server_range(&path) else {
            return Err(TimerError::InconsistentRange(format!(
                "no closed server range to adjust for {path}"
            )));
        };
        let server_duration = end - start;
        let expected = duration.map_or(server_duration, |duration| duration.min(server_duration));
        let delay = ((server_duration - expected) / 2.0).max(0.0);

        let filter = TagFilter::Exact(path.clone());
        let removed = self.state.timeline.remove(&filter, TargetCriteria::Client);
        debug!(tags = %path, removed, expected, delay, "recording client duration");
        self.state.timeline.add(TimePoint::new(
            path.clone(),
            start + delay,
            PointType::Start,
            TimeTarget::Client,
        )?);
        self.state.timeline.add(TimePoint::new(path, end - delay, PointType::End, TimeTarget::Client)?);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Sums the closed ranges of every path containing all `tags`.
    ///
    /// Empty `tags` cover the whole timeline.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn compute<S: AsRef<str>>(
        &self,
        tags: &[S],
        target: TargetCriteria,
    ) -> Result<f64, TimerError> {
        self.state.timeline.compute(&TagFilter::containing(tags), target, None)
    }

    /// Like [`Timer::compute`], counting open ranges up to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn compute_until<S: AsRef<str>>(
        &self,
        tags: &[S],
        target: TargetCriteria,
        now: f64,
    ) -> Result<f64, TimerError> {
        self.state.timeline.compute(&TagFilter::containing(tags), target, Some(now))
    }

    /// Returns true once the computed duration reaches `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn timeout<S: AsRef<str>>(
        &self,
        limit: f64,
        tags: &[S],
        target: TargetCriteria,
    ) -> Result<bool, TimerError> {
        Ok(self.compute(tags, target)? >= limit)
    }

    /// Returns the earliest start timestamp of paths containing all `tags`.
    #[must_use]
    pub fn first_timestamp<S: AsRef<str>>(&self, tags: &[S]) -> Option<f64> {
        self.state
            .timeline
            .find(&TagFilter::containing(tags), TargetCriteria::All)
            .into_iter()
            .filter(|point| point.is_start())
            .map(TimePoint::timestamp)
            .reduce(f64::min)
    }

    /// Returns the latest end timestamp of paths containing all `tags`.
    #[must_use]
    pub fn last_timestamp<S: AsRef<str>>(&self, tags: &[S]) -> Option<f64> {
        self.state
            .timeline
            .find(&TagFilter::containing(tags), TargetCriteria::All)
            .into_iter()
            .filter(|point| point.is_end())
            .map(TimePoint::timestamp)
            .reduce(f64::max)
    }

    /// Returns the latest timestamp recorded on the timeline.
    #[must_use]
    pub fn last_registered_timestamp(&self) -> Option<f64> {
        self.state.timeline.points().iter().map(TimePoint::timestamp).reduce(f64::max)
    }

    // ------------------------------------------------------------------------
    // Extra Time
    // ------------------------------------------------------------------------

    /// Returns the extra time budget in seconds.
    #[must_use]
    pub const fn extra_time(&self) -> f64 {
        self.state.extra_time
    }

    /// Sets the extra time budget.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for negative or non-finite seconds.
    pub fn set_extra_time(&mut self, seconds: f64) -> Result<(), TimerError> {
        self.state.extra_time = checked_seconds("extra time", seconds)?;
        Ok(())
    }

    /// Returns the administrator extension in seconds.
    #[must_use]
    pub const fn extended_time(&self) -> f64 {
        self.state.extended_time
    }

    /// Sets the administrator extension.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for negative or non-finite seconds.
    pub fn set_extended_time(&mut self, seconds: f64) -> Result<(), TimerError> {
        self.state.extended_time = checked_seconds("extended time", seconds)?;
        Ok(())
    }

    /// Returns the recorded consumed extra time in seconds.
    #[must_use]
    pub const fn recorded_consumed_extra_time(&self) -> f64 {
        self.state.consumed_extra_time
    }

    /// Sets the recorded consumed extra time.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] for negative or non-finite seconds.
    pub fn set_consumed_extra_time(&mut self, seconds: f64) -> Result<(), TimerError> {
        self.state.consumed_extra_time = checked_seconds("consumed extra time", seconds)?;
        Ok(())
    }

    /// Returns the extra time drawn by the scope selected by `tags`.
    ///
    /// With a positive `max_time`, the time spent beyond it counts as extra
    /// time, capped at the budget. The result never drops below the recorded
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn consumed_extra_time<S: AsRef<str>>(
        &self,
        tags: &[S],
        max_time: f64,
        target: TargetCriteria,
    ) -> Result<f64, TimerError> {
        let recorded = self.state.consumed_extra_time;
        if max_time <= 0.0 {
            return Ok(recorded);
        }
        let spent = self.compute(tags, target)?;
        let consumed = (spent - max_time).max(0.0).min(self.state.extra_time);
        Ok(round_micros(consumed.max(recorded)))
    }

    /// Returns the extra time still available.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn remaining_extra_time<S: AsRef<str>>(
        &self,
        tags: &[S],
        max_time: f64,
        target: TargetCriteria,
    ) -> Result<f64, TimerError> {
        let consumed = self.consumed_extra_time(tags, max_time, target)?;
        Ok(round_micros((self.state.extra_time - consumed).max(0.0)))
    }

    /// Computes and records the consumed extra time.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] for [`TargetCriteria::All`].
    pub fn update_consumed_extra_time<S: AsRef<str>>(
        &mut self,
        tags: &[S],
        max_time: f64,
        target: TargetCriteria,
    ) -> Result<f64, TimerError> {
        let consumed = self.consumed_extra_time(tags, max_time, target)?;
        self.state.consumed_extra_time = consumed;
        Ok(consumed)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Encodes the state and writes it to storage.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidStorage`] without a storage collaborator.
    /// - [`TimerError::InvalidData`] when encoding fails.
    /// - [`TimerError::Store`] when the write fails.
    pub fn save(&self) -> Result<(), TimerError> {
        let binding = self.binding()?;
        let encoded = self.format.encode(&self.state)?;
        binding.storage.set(&binding.owner_id, &binding.key, &encoded)?;
        debug!(
            owner_id = %binding.owner_id,
            key = %binding.key,
            points = self.state.timeline.len(),
            format = self.format.name(),
            bytes = encoded.len(),
            "saved timer state"
        );
        Ok(())
    }

    /// Reads and decodes the state from storage, replacing the current one.
    ///
    /// A missing value yields an empty state.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidStorage`] without a storage collaborator.
    /// - [`TimerError::InvalidData`] when the stored value is not a timer
    ///   state.
    /// - [`TimerError::Store`] when the read fails.
    pub fn load(&mut self) -> Result<(), TimerError> {
        let binding = self.binding()?;
        let state = match binding.storage.get(&binding.owner_id, &binding.key)? {
            Some(raw) => self.format.decode(&raw)?,
            None => TimerState::new(),
        };
        debug!(
            owner_id = %binding.owner_id,
            key = %binding.key,
            points = state.timeline.len(),
            "loaded timer state"
        );
        self.state = state;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Returns the storage binding or fails.
    fn binding(&self) -> Result<&StorageBinding, TimerError> {
        self.storage
            .as_ref()
            .ok_or_else(|| TimerError::InvalidStorage("no timer storage configured".to_string()))
    }

    /// Returns the latest server point of an exact path.
    ///
    /// Ties keep the most recently recorded point.
    fn last_server_point(&self, path: &TagPath) -> Option<&TimePoint> {
        self.state
            .timeline
            .find(&TagFilter::Exact(path.clone()), TargetCriteria::Server)
            .into_iter()
            .reduce(|latest, point| if point.micros() >= latest.micros() { point } else { latest })
    }

    /// Returns the last closed server range of an exact path.
    fn last_closed_server_range(&self, path: &TagPath) -> Option<(f64, f64)> {
        let mut points =
            self.state.timeline.find(&TagFilter::Exact(path.clone()), TargetCriteria::Server);
        points.sort_by_key(|point| point.micros());
        let mut open: Option<f64> = None;
        let mut closed = None;
        for point in points {
            match point.point_type() {
                PointType::Start => open = Some(point.timestamp()),
                PointType::End => {
                    if let Some(start) = open.take() {
                        closed = Some((start, point.timestamp()));
                    }
                }
            }
        }
        closed
    }
}

/// Validates a number of seconds.
fn checked_seconds(field: &str, seconds: f64) -> Result<f64, TimerError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimerError::invalid(format!(
            "{field} must be a non-negative number of seconds, got {seconds}"
        )));
    }
    Ok(seconds)
}
